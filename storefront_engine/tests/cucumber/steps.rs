use chrono::{Duration, Utc};
use cucumber::{given, then, when};
use storefront_engine::{
    checkout_objects::{CheckoutOutcome, PlaceOrderRequest, WebhookOutcome},
    db_types::{CartItem, Money},
    traits::{CartManagement, CatalogManagement, OrderManagement},
    CheckoutError,
};

use crate::{
    cucumber::StorefrontWorld,
    support::{
        fake_gateway::{FakeGateway, GOOD_SIGNATURE},
        prepare_env::{fill_cart, plant_otp},
    },
};

const ADDRESS: &str = "21 Kloof Street, Gardens";

#[given(expr = "user {int} has {int} {string} in their account cart")]
async fn account_cart(world: &mut StorefrontWorld, user_id: i64, quantity: i64, product: String) {
    let id = world.product_id(&product);
    fill_cart(world.system().api.db(), user_id, &[(id, quantity)]).await;
}

#[given(expr = "user {int} has been sent the OTP {word}")]
async fn otp_sent(world: &mut StorefrontWorld, user_id: i64, code: String) {
    plant_otp(world.system().api.db(), user_id, &code, Duration::minutes(5)).await;
}

#[given(expr = "user {int} was sent the OTP {word}, which has expired")]
async fn otp_expired(world: &mut StorefrontWorld, user_id: i64, code: String) {
    plant_otp(world.system().api.db(), user_id, &code, Duration::seconds(-30)).await;
}

#[when(expr = "user {int} signs in with a guest cart of {int} {string} and sync id {word}")]
async fn sign_in_with_guest_cart(
    world: &mut StorefrontWorld,
    user_id: i64,
    quantity: i64,
    product: String,
    sync_id: String,
) {
    let items = vec![CartItem::new(world.product_id(&product), quantity, Utc::now())];
    let merged =
        world.system().carts.sync_guest_cart(user_id, Some(sync_id), items).await.expect("Cart sync failed");
    world.last_sync = Some(merged);
}

#[when(expr = "user {int} pays cash on delivery with OTP {word}")]
async fn pay_cod(world: &mut StorefrontWorld, user_id: i64, code: String) {
    let request =
        PlaceOrderRequest { shipping_address: ADDRESS.into(), payment_method: "cod".into(), otp: Some(code) };
    let result = world.system().api.place_order(user_id, request).await;
    world.last_checkout = Some(result);
}

#[when(expr = "user {int} checks out with {word}")]
async fn pay_online(world: &mut StorefrontWorld, user_id: i64, method: String) {
    let request = PlaceOrderRequest { shipping_address: ADDRESS.into(), payment_method: method, otp: None };
    let result = world.system().api.place_order(user_id, request).await;
    world.last_checkout = Some(result);
}

#[when(expr = "the gateway reports the payment as {word}")]
async fn gateway_callback(world: &mut StorefrontWorld, status: String) {
    let session_id = world.last_session_id();
    let body = FakeGateway::callback_body(&session_id, &status);
    let outcome =
        world.system().api.handle_payment_callback(GOOD_SIGNATURE, &body).await.expect("Callback was not accepted");
    world.last_webhook = Some(outcome);
}

#[when(expr = "the price of {string} changes to {int}")]
async fn change_price(world: &mut StorefrontWorld, product: String, price: i64) {
    let id = world.product_id(&product);
    sqlx::query("UPDATE products SET price = $1 WHERE id = $2")
        .bind(price)
        .bind(id)
        .execute(world.system().api.db().pool())
        .await
        .expect("Could not change the price");
}

#[then("the order is placed")]
async fn order_placed(world: &mut StorefrontWorld) {
    match &world.last_checkout {
        Some(Ok(CheckoutOutcome::Placed(_))) => {},
        other => panic!("Expected a placed order, got {other:?}"),
    }
}

#[then(expr = "the checkout fails with {word}")]
async fn checkout_fails(world: &mut StorefrontWorld, expected: String) {
    let err = match &world.last_checkout {
        Some(Err(e)) => e,
        other => panic!("Expected the checkout to fail, got {other:?}"),
    };
    let name = match err {
        CheckoutError::ValidationError(_) => "ValidationError",
        CheckoutError::OtpInvalid => "OtpInvalid",
        CheckoutError::OtpExpired => "OtpExpired",
        CheckoutError::InsufficientStock(_) => "InsufficientStock",
        CheckoutError::GatewayUnavailable(_) => "GatewayUnavailable",
        CheckoutError::GatewayRejected(_) => "GatewayRejected",
        CheckoutError::InvalidCallbackSignature => "InvalidCallbackSignature",
        CheckoutError::SessionNotFound(_) => "SessionNotFound",
        CheckoutError::InvalidTransition(_) => "InvalidTransition",
        CheckoutError::DatabaseError(_) => "DatabaseError",
    };
    assert_eq!(name, expected, "Unexpected checkout error: {err}");
}

#[then(expr = "the shopper is sent to the gateway")]
async fn sent_to_gateway(world: &mut StorefrontWorld) {
    let session_id = world.last_session_id();
    assert!(!session_id.is_empty());
}

#[then(expr = "the webhook result is {word}")]
async fn webhook_result(world: &mut StorefrontWorld, expected: String) {
    let name = match world.last_webhook.as_ref().expect("No webhook was delivered") {
        WebhookOutcome::OrderPlaced { .. } => "OrderPlaced",
        WebhookOutcome::Duplicate { .. } => "Duplicate",
        WebhookOutcome::SessionClosed { .. } => "SessionClosed",
        WebhookOutcome::StockUnavailable { .. } => "StockUnavailable",
    };
    assert_eq!(name, expected);
}

#[then(expr = "user {int} has {int} order(s)")]
async fn order_count(world: &mut StorefrontWorld, user_id: i64, count: usize) {
    let orders = world.system().api.db().fetch_orders_for_user(user_id).await.expect("Error fetching orders");
    assert_eq!(orders.len(), count);
}

#[then(expr = "the latest order of user {int} totals {int}")]
async fn latest_order_total(world: &mut StorefrontWorld, user_id: i64, total: i64) {
    let orders = world.system().orders.orders_for_user(user_id).await.expect("Error fetching orders");
    let latest = orders.first().expect("User has no orders");
    assert_eq!(latest.total_amount, Money::from(total));
}

#[then(expr = "{string} has {int} in stock")]
async fn stock_level(world: &mut StorefrontWorld, product: String, stock: i64) {
    let id = world.product_id(&product);
    let product = world.system().api.db().fetch_product(id).await.expect("Error fetching product");
    assert_eq!(product.map(|p| p.stock), Some(stock));
}

#[then(expr = "user {int} has {int} {string} in their account cart")]
async fn cart_quantity(world: &mut StorefrontWorld, user_id: i64, quantity: i64, product: String) {
    let id = world.product_id(&product);
    let cart = world.system().api.db().fetch_cart(user_id).await.expect("Error fetching cart");
    let actual = cart.iter().find(|i| i.product_id == id).map(|i| i.quantity).unwrap_or(0);
    assert_eq!(actual, quantity);
}

#[then(expr = "the merge reported {int} warning(s)")]
async fn merge_warnings(world: &mut StorefrontWorld, count: usize) {
    let merged = world.last_sync.as_ref().expect("No cart was synced");
    assert_eq!(merged.warnings.len(), count);
}
