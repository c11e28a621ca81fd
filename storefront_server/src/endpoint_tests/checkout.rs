use std::{
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Duration;
use futures::FutureExt;
use serde_json::{json, Value};
use sf_common::Secret;
use storefront_engine::{
    db_types::{Money, Role},
    events::{EventHandlers, EventHooks, EventProducers},
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_products, tear_down},
    traits::CartManagement,
    CheckoutApi,
    OrderApi,
    OtpSettings,
    SqliteDatabase,
};

use super::{
    helpers::{get_request, issue_token, json, post_request, send_public_request},
    mocks::{StubGateway, GOOD_SIGNATURE},
};
use crate::{
    integrations::PAYMENT_SIGNATURE_HEADER,
    routes::{
        CreatePaymentSessionRoute,
        GenerateOtpRoute,
        OrderBySessionRoute,
        PaymentWebhookRoute,
        PlaceOrderRoute,
        ProductsRoute,
    },
};

const ADDRESS: &str = "42 Wallaby Way, Sydney";

fn otp_settings() -> OtpSettings {
    OtpSettings { ttl: Duration::minutes(5), max_attempts: 5, pepper: Secret::new("endpoint-pepper".to_string()) }
}

fn configure_with(
    db: SqliteDatabase,
    gateway: StubGateway,
    producers: EventProducers,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let checkout = CheckoutApi::new(db.clone(), gateway, otp_settings(), producers);
        cfg.service(ProductsRoute::<SqliteDatabase, StubGateway>::new())
            .service(GenerateOtpRoute::<SqliteDatabase, StubGateway>::new())
            .service(CreatePaymentSessionRoute::<SqliteDatabase, StubGateway>::new())
            .service(PlaceOrderRoute::<SqliteDatabase, StubGateway>::new())
            .service(OrderBySessionRoute::<SqliteDatabase>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, StubGateway>::new())
            .app_data(web::Data::new(checkout))
            .app_data(web::Data::new(OrderApi::new(db)));
    }
}

/// Subscribes to OTP issuance and keeps the last code, standing in for the shopper's phone.
async fn capture_otp_codes() -> (EventProducers, Arc<Mutex<Option<String>>>) {
    let inbox = Arc::new(Mutex::new(None::<String>));
    let slot = Arc::clone(&inbox);
    let mut hooks = EventHooks::default();
    hooks.on_otp_issued(move |ev| {
        let slot = Arc::clone(&slot);
        async move {
            *slot.lock().unwrap() = Some(ev.code);
        }
        .boxed()
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    (producers, inbox)
}

async fn wait_for_code(inbox: &Arc<Mutex<Option<String>>>) -> String {
    for _ in 0..100 {
        if let Some(code) = inbox.lock().unwrap().take() {
            return code;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    panic!("No OTP was delivered");
}

async fn stock_of(db: &SqliteDatabase, gateway: &StubGateway, product_id: i64) -> i64 {
    let token = issue_token(999, vec![Role::User]);
    let configure = configure_with(db.clone(), gateway.clone(), EventProducers::default());
    let (_, body) = get_request(&token, "/products", configure).await.unwrap();
    let products = json(&body);
    products.as_array().unwrap().iter().find(|p| p["id"] == product_id).and_then(|p| p["stock"].as_i64()).unwrap()
}

async fn send_callback(
    db: &SqliteDatabase,
    gateway: &StubGateway,
    signature: Option<&str>,
    body: Value,
) -> (StatusCode, String) {
    let mut req = TestRequest::post().uri("/payments/webhook").set_payload(body.to_string());
    if let Some(sig) = signature {
        req = req.insert_header((PAYMENT_SIGNATURE_HEADER, sig));
    }
    send_public_request(req, configure_with(db.clone(), gateway.clone(), EventProducers::default())).await
}

#[actix_web::test]
async fn cash_on_delivery_checkout() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = seed_products(&db, &[("Widget", 500, 2)]).await;
    let gateway = StubGateway::default();
    let (producers, inbox) = capture_otp_codes().await;
    let configure = || configure_with(db.clone(), gateway.clone(), producers.clone());
    let token = issue_token(5, vec![Role::User]);
    db.set_cart_item(5, ids[0], 2).await.unwrap();

    let order_body = json!({ "shippingAddress": ADDRESS, "paymentMethod": "cod" });
    let (status, body) = post_request(&token, "/orders", order_body, configure()).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"An OTP is required for cash on delivery orders"}"#);

    let (status, _) = post_request(&token, "/orders/generate-otp", json!({}), configure()).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    let code = wait_for_code(&inbox).await;

    let order_body = json!({ "shippingAddress": ADDRESS, "paymentMethod": "cod", "otp": code });
    let (status, body) = post_request(&token, "/orders", order_body.clone(), configure()).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    let order = json(&body);
    assert_eq!(order["userId"], 5);
    assert_eq!(order["status"], "Placed");
    assert_eq!(order["paymentMethod"], "cod");
    assert_eq!(order["totalAmount"], 1000);
    assert_eq!(stock_of(&db, &gateway, ids[0]).await, 0);

    // The code was used up with the first order
    db.set_cart_item(5, ids[0], 1).await.unwrap();
    let (status, body) = post_request(&token, "/orders", order_body, configure()).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"OTP is invalid"}"#);
    tear_down(db).await;
}

#[actix_web::test]
async fn online_checkout_via_webhook() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = seed_products(&db, &[("Gadget", 1200, 5)]).await;
    let gateway = StubGateway::default();
    let configure = || configure_with(db.clone(), gateway.clone(), EventProducers::default());
    let token = issue_token(6, vec![Role::User]);
    db.set_cart_item(6, ids[0], 2).await.unwrap();

    let order_body = json!({ "shippingAddress": ADDRESS, "paymentMethod": "card" });
    let (status, body) = post_request(&token, "/orders", order_body, configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let redirect = json(&body);
    assert_eq!(redirect["sessionId"], "sess_1");
    assert_eq!(redirect["redirectUrl"], "https://stubpay.test/pay/sess_1");
    assert_eq!(gateway.requests()[0].amount, Money::from(2400));

    let (status, body) = get_request(&token, "/orders/by-session/sess_1", configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "null");
    assert_eq!(stock_of(&db, &gateway, ids[0]).await, 5);

    let paid = json!({ "sessionId": "sess_1", "status": "paid" });
    let (status, body) = send_callback(&db, &gateway, Some("forged"), paid.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Payment callback signature is invalid"}"#);
    let (status, _) = send_callback(&db, &gateway, None, paid.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send_callback(&db, &gateway, Some(GOOD_SIGNATURE), paid.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let outcome = json(&body);
    assert_eq!(outcome["result"], "orderPlaced");
    let order_id = outcome["orderId"].as_i64().unwrap();

    // The provider redelivers. Still one order.
    let (status, body) = send_callback(&db, &gateway, Some(GOOD_SIGNATURE), paid).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({ "result": "duplicate", "orderId": order_id }));
    assert_eq!(stock_of(&db, &gateway, ids[0]).await, 3);

    let (status, body) = get_request(&token, "/orders/by-session/sess_1", configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let order = json(&body);
    assert_eq!(order["id"], order_id);
    assert_eq!(order["sessionId"], "sess_1");
    assert_eq!(order["totalAmount"], 2400);
    tear_down(db).await;
}

#[actix_web::test]
async fn odd_callbacks() {
    let db = prepare_test_env(&random_db_path()).await;
    let gateway = StubGateway::default();
    let unknown = json!({ "sessionId": "sess_404", "status": "paid" });
    let (status, body) = send_callback(&db, &gateway, Some(GOOD_SIGNATURE), unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "the gateway must retry until the session is stored");
    assert_eq!(body, r#"{"error":"The data was not found. Payment session sess_404"}"#);

    let (status, _) = send_callback(&db, &gateway, Some(GOOD_SIGNATURE), json!({ "hello": "world" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(db).await;
}

#[actix_web::test]
async fn payment_sessions_are_not_opened_for_missing_stock() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = seed_products(&db, &[("Gadget", 1200, 5)]).await;
    let gateway = StubGateway::default();
    let token = issue_token(7, vec![Role::User]);
    db.set_cart_item(7, ids[0], 9).await.unwrap();

    let body = json!({ "shippingAddress": ADDRESS, "paymentMethod": "upi" });
    let configure = configure_with(db.clone(), gateway.clone(), EventProducers::default());
    let (status, body) = post_request(&token, "/orders/create-payment-session", body, configure).await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    let err = json(&body);
    assert_eq!(err["lines"][0]["productId"], ids[0]);
    assert_eq!(err["lines"][0]["requested"], 9);
    assert_eq!(err["lines"][0]["available"], 5);
    assert!(gateway.requests().is_empty());
    tear_down(db).await;
}
