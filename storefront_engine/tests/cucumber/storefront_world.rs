use std::collections::HashMap;

use cucumber::World;
use storefront_engine::{
    cart::{MergePolicy, MergedCart},
    checkout_objects::{CheckoutOutcome, WebhookOutcome},
    CartApi,
    CheckoutApi,
    CheckoutError,
    OrderApi,
    SqliteDatabase,
};

use crate::support::{
    fake_gateway::FakeGateway,
    prepare_env::{otp_settings, prepare_test_env, random_db_path},
};

#[derive(Default, Debug, World)]
pub struct StorefrontWorld {
    pub system: Option<StorefrontSystem>,
    pub products: HashMap<String, i64>,
    pub last_checkout: Option<Result<CheckoutOutcome, CheckoutError>>,
    pub last_sync: Option<MergedCart>,
    pub last_webhook: Option<WebhookOutcome>,
}

#[derive(Debug)]
pub struct StorefrontSystem {
    pub api: CheckoutApi<SqliteDatabase, FakeGateway>,
    pub carts: CartApi<SqliteDatabase>,
    pub orders: OrderApi<SqliteDatabase>,
}

impl StorefrontWorld {
    pub fn system(&self) -> &StorefrontSystem {
        self.system.as_ref().expect("Storefront not initialised")
    }

    pub fn product_id(&self, name: &str) -> i64 {
        *self.products.get(name).unwrap_or_else(|| panic!("No product called {name}"))
    }

    pub fn last_session_id(&self) -> String {
        match &self.last_checkout {
            Some(Ok(CheckoutOutcome::AwaitingPayment(session))) => session.session_id.clone(),
            other => panic!("The last checkout did not open a payment session: {other:?}"),
        }
    }
}

impl StorefrontSystem {
    pub async fn new(policy: MergePolicy) -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let carts = CartApi::new(db.clone(), policy);
        let orders = OrderApi::new(db.clone());
        let api = CheckoutApi::new(db, FakeGateway::starting_at(123), otp_settings(), Default::default());
        Self { api, carts, orders }
    }
}
