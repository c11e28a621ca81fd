use chrono::{Duration, Utc};
use log::*;
use sf_common::Secret;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use storefront_engine::{
    db_types::{CartItem, NewOtpChallenge, NewProduct, OtpPurpose},
    events::EventProducers,
    helpers::hash_otp_code,
    traits::{CartManagement, CatalogManagement, CheckoutDatabase, OtpManagement},
    CheckoutApi,
    OtpSettings,
    SqliteDatabase,
};

use super::fake_gateway::FakeGateway;

pub const TEST_PEPPER: &str = "pepper-for-tests";

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/sf_it_{}.db", dir.display(), rand::random::<u64>())
}

/// A fresh, migrated database at `url`.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        Sqlite::drop_database(url).await.expect("Error dropping stale test database");
    }
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub fn otp_settings() -> OtpSettings {
    OtpSettings { pepper: Secret::new(TEST_PEPPER.to_string()), ..Default::default() }
}

pub async fn setup() -> CheckoutApi<SqliteDatabase, FakeGateway> {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> CheckoutApi<SqliteDatabase, FakeGateway> {
    let db = prepare_test_env(&random_db_path()).await;
    CheckoutApi::new(db, FakeGateway::starting_at(123), otp_settings(), producers)
}

pub async fn tear_down(db: &SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}

/// Adds `(name, price in minor units, stock)` products and returns their ids.
pub async fn seed_products(db: &SqliteDatabase, products: &[(&str, i64, i64)]) -> Vec<i64> {
    let mut ids = Vec::with_capacity(products.len());
    for (name, price, stock) in products {
        let p = db
            .insert_product(NewProduct::new(*name, (*price).into(), *stock))
            .await
            .expect("Error inserting product");
        ids.push(p.id);
    }
    ids
}

pub async fn fill_cart(db: &SqliteDatabase, user_id: i64, lines: &[(i64, i64)]) {
    let now = Utc::now();
    let items = lines.iter().map(|(p, q)| CartItem::new(*p, *q, now)).collect::<Vec<_>>();
    db.replace_cart(user_id, &items).await.expect("Error filling cart");
}

/// Stores an order OTP challenge with a code the test knows.
pub async fn plant_otp(db: &SqliteDatabase, user_id: i64, code: &str, ttl: Duration) {
    let challenge = NewOtpChallenge {
        user_id,
        purpose: OtpPurpose::PlaceOrder,
        code_hash: hash_otp_code(code, TEST_PEPPER.as_bytes()),
        expires_at: Utc::now() + ttl,
    };
    db.insert_challenge(challenge).await.expect("Error storing OTP challenge");
}

pub async fn stock_of(db: &SqliteDatabase, product_id: i64) -> i64 {
    db.fetch_product(product_id).await.expect("Error fetching product").expect("Product does not exist").stock
}
