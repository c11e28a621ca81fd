use cucumber::given;
use storefront_engine::cart::MergePolicy;

use crate::{
    cucumber::{storefront_world::StorefrontSystem, StorefrontWorld},
    support::prepare_env::seed_products,
};

#[given("a fresh storefront")]
async fn fresh_storefront(world: &mut StorefrontWorld) {
    world.system = Some(StorefrontSystem::new(MergePolicy::Sum).await);
}

#[given(expr = "a fresh storefront that merges carts with the {word} policy")]
async fn fresh_storefront_with_policy(world: &mut StorefrontWorld, policy: String) {
    let policy = policy.parse::<MergePolicy>().expect("Unknown merge policy");
    world.system = Some(StorefrontSystem::new(policy).await);
}

#[given(expr = "a product {string} priced at {int} with {int} in stock")]
async fn add_product(world: &mut StorefrontWorld, name: String, price: i64, stock: i64) {
    let ids = seed_products(world.system().api.db(), &[(name.as_str(), price, stock)]).await;
    world.products.insert(name, ids[0]);
}
