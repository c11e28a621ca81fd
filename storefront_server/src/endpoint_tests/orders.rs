use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::json;
use storefront_engine::{
    db_types::{OrderStatusType, Role},
    traits::OrderManagementError,
    OrderApi,
};

use super::{
    helpers::{get_request, issue_token, json, send_request},
    mocks::{sample_order, MockOrderManager},
};
use crate::routes::{MyOrdersRoute, OrderByIdRoute, OrderBySessionRoute, UpdateOrderStatusRoute};

fn configure_with(mock: MockOrderManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(MyOrdersRoute::<MockOrderManager>::new())
            .service(OrderBySessionRoute::<MockOrderManager>::new())
            .service(OrderByIdRoute::<MockOrderManager>::new())
            .service(UpdateOrderStatusRoute::<MockOrderManager>::new())
            .app_data(web::Data::new(OrderApi::new(mock)));
    }
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockOrderManager::new();
    mock.expect_fetch_orders_for_user()
        .withf(|user_id| *user_id == 42)
        .times(1)
        .returning(|_| {
            Ok(vec![sample_order(2, 42, OrderStatusType::Shipped), sample_order(1, 42, OrderStatusType::Placed)])
        });
    let token = issue_token(42, vec![Role::User]);
    let (status, body) = get_request(&token, "/orders", configure_with(mock)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let orders = json(&body);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], 2);
    assert_eq!(orders[0]["status"], "Shipped");
    assert_eq!(orders[1]["totalAmount"], 2250);
    assert_eq!(orders[1]["items"][0]["priceAtPurchase"], 500);
    assert_eq!(orders[1]["paymentDetails"]["type"], "cashOnDelivery");
}

#[actix_web::test]
async fn fetch_my_orders_no_headers() {
    let _ = env_logger::try_init().ok();
    let mock = MockOrderManager::new();
    let err = get_request("", "/orders", configure_with(mock)).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. No access token was provided.");
}

#[actix_web::test]
async fn fetch_own_order_by_id() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockOrderManager::new();
    mock.expect_fetch_order().returning(|id| Ok(Some(sample_order(id, 42, OrderStatusType::Placed))));
    let token = issue_token(42, vec![Role::User]);
    let (status, body) = get_request(&token, "/orders/17", configure_with(mock)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["id"], 17);
}

#[actix_web::test]
async fn someone_elses_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockOrderManager::new();
    mock.expect_fetch_order().returning(|id| Ok(Some(sample_order(id, 7, OrderStatusType::Placed))));
    let token = issue_token(42, vec![Role::User]);
    let (status, body) = get_request(&token, "/orders/17", configure_with(mock)).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Order #17"}"#);
}

#[actix_web::test]
async fn order_for_unconfirmed_session_is_null() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockOrderManager::new();
    mock.expect_fetch_order_by_session_id().withf(|sid| sid.to_string() == "sess_9").returning(|_| Ok(None));
    let token = issue_token(42, vec![Role::User]);
    let (status, body) =
        get_request(&token, "/orders/by-session/sess_9", configure_with(mock)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "null");
}

#[actix_web::test]
async fn admin_ships_an_order() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockOrderManager::new();
    mock.expect_update_order_status()
        .withf(|id, status| *id == 3 && *status == OrderStatusType::Shipped)
        .times(1)
        .returning(|id, status| Ok(sample_order(id, 42, status)));
    let token = issue_token(1, vec![Role::User, Role::Admin]);
    let req = TestRequest::post().uri("/admin/orders/3/status").set_json(json!({"status": "Shipped"}));
    let (status, body) = send_request(&token, req, configure_with(mock)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "Shipped");
}

#[actix_web::test]
async fn shoppers_cannot_change_order_status() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockOrderManager::new();
    mock.expect_update_order_status().never();
    let token = issue_token(42, vec![Role::User]);
    let req = TestRequest::post().uri("/admin/orders/3/status").set_json(json!({"status": "Cancelled"}));
    let err = send_request(&token, req, configure_with(mock)).await.expect_err("Request should have failed");
    assert_eq!(err, "Insufficient permissions.");
}

#[actix_web::test]
async fn invalid_status_transition() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockOrderManager::new();
    mock.expect_update_order_status().returning(|_, to| {
        Err(OrderManagementError::InvalidStatusTransition { from: OrderStatusType::Delivered, to })
    });
    let token = issue_token(1, vec![Role::User, Role::Admin]);
    let req = TestRequest::post().uri("/admin/orders/3/status").set_json(json!({"status": "Placed"}));
    let (status, body) = send_request(&token, req, configure_with(mock)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"An order cannot move from Delivered to Placed"}"#);
}
