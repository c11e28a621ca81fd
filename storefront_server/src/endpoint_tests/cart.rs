use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use serde_json::json;
use storefront_engine::{
    cart::MergePolicy,
    db_types::Role,
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_products, tear_down},
    CartApi,
    SqliteDatabase,
};

use super::helpers::{get_request, issue_token, json, post_request, send_request};
use crate::routes::{MyCartRoute, RemoveCartItemRoute, SetCartItemRoute, SyncCartRoute};

fn configure_with(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(SyncCartRoute::<SqliteDatabase>::new())
            .service(MyCartRoute::<SqliteDatabase>::new())
            .service(SetCartItemRoute::<SqliteDatabase>::new())
            .service(RemoveCartItemRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(CartApi::new(db, MergePolicy::Sum)));
    }
}

async fn set_quantity(db: &SqliteDatabase, token: &str, product_id: i64, quantity: i64) -> (StatusCode, String) {
    let req = TestRequest::put().uri(&format!("/cart/items/{product_id}")).set_json(json!({ "quantity": quantity }));
    send_request(token, req, configure_with(db.clone())).await.expect("Request failed")
}

fn quantity_of(cart: &serde_json::Value, product_id: i64) -> Option<i64> {
    cart["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["productId"] == product_id)
        .and_then(|i| i["quantity"].as_i64())
}

#[actix_web::test]
async fn guest_cart_is_merged_once() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = seed_products(&db, &[("Widget", 500, 10), ("Gadget", 1200, 3)]).await;
    let token = issue_token(1, vec![Role::User]);
    set_quantity(&db, &token, ids[0], 1).await;
    set_quantity(&db, &token, ids[1], 3).await;

    let body = json!({
        "syncId": "sync-abc",
        "items": [{ "productId": ids[0], "quantity": 2, "modifiedAt": Utc::now() }]
    });
    let (status, merged) =
        post_request(&token, "/cart/sync", body.clone(), configure_with(db.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let merged = json(&merged);
    assert_eq!(quantity_of(&merged, ids[0]), Some(3));
    assert_eq!(quantity_of(&merged, ids[1]), Some(3));
    assert!(merged["warnings"].as_array().unwrap().is_empty());

    // The client retries after a timeout. Nothing is added twice.
    let (status, again) =
        post_request(&token, "/cart/sync", body, configure_with(db.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quantity_of(&json(&again), ids[0]), Some(3));

    let (status, cart) = get_request(&token, "/cart", configure_with(db.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&cart).as_array().unwrap().len(), 2);
    tear_down(db).await;
}

#[actix_web::test]
async fn merged_quantities_are_clamped_to_stock() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = seed_products(&db, &[("Gadget", 1200, 3)]).await;
    let token = issue_token(2, vec![Role::User]);
    let body = json!({
        "syncId": "sync-clamp",
        "items": [{ "productId": ids[0], "quantity": 5, "modifiedAt": Utc::now() }]
    });
    let (status, merged) =
        post_request(&token, "/cart/sync", body, configure_with(db.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let merged = json(&merged);
    assert_eq!(quantity_of(&merged, ids[0]), Some(3));
    let warnings = merged["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["productId"], ids[0]);
    assert_eq!(warnings[0]["kind"], "Clamped");
    tear_down(db).await;
}

#[actix_web::test]
async fn carts_are_private() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = seed_products(&db, &[("Widget", 500, 10)]).await;
    let alice = issue_token(10, vec![Role::User]);
    let bob = issue_token(11, vec![Role::User]);
    set_quantity(&db, &alice, ids[0], 4).await;
    let (status, cart) = get_request(&bob, "/cart", configure_with(db.clone())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart, "[]");
    tear_down(db).await;
}

#[actix_web::test]
async fn cart_edits_are_validated() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = seed_products(&db, &[("Widget", 500, 10)]).await;
    let token = issue_token(3, vec![Role::User]);

    let (status, body) = set_quantity(&db, &token, ids[0], 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Quantity must be between 1 and 10000, got 0"}"#);

    let (status, body) = set_quantity(&db, &token, 999, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Product 999 does not exist"}"#);

    let bad_sync = json!({
        "syncId": "sync-bad",
        "items": [{ "productId": ids[0], "quantity": -2, "modifiedAt": Utc::now() }]
    });
    let (status, _) = post_request(&token, "/cart/sync", bad_sync, configure_with(db.clone())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let huge_sync = json!({
        "syncId": "sync-huge",
        "items": [{ "productId": ids[0], "quantity": i64::MAX, "modifiedAt": Utc::now() }]
    });
    let (status, body) = post_request(&token, "/cart/sync", huge_sync, configure_with(db.clone())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("must be between 1 and 10000"), "was: {body}");

    let (status, body) =
        post_request(&token, "/cart/sync", json!({ "items": "nope" }), configure_with(db.clone())).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Could not read request body"), "was: {body}");
    tear_down(db).await;
}

#[actix_web::test]
async fn remove_cart_lines() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = seed_products(&db, &[("Widget", 500, 10)]).await;
    let token = issue_token(4, vec![Role::User]);
    set_quantity(&db, &token, ids[0], 2).await;
    let path = format!("/cart/items/{}", ids[0]);

    let (status, body) =
        send_request(&token, TestRequest::delete().uri(&path), configure_with(db.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["success"], true);

    let (status, body) =
        send_request(&token, TestRequest::delete().uri(&path), configure_with(db.clone())).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["success"], false);
    tear_down(db).await;
}
