use actix_web::{http::StatusCode, web::ServiceConfig};
use chrono::Duration;
use storefront_engine::db_types::Role;

use super::helpers::{get_request, issue_token, TEST_AUTH_SECRET};
use crate::{auth::TokenIssuer, config::AuthConfig, routes::CheckTokenRoute};

fn configure(cfg: &mut ServiceConfig) {
    cfg.service(CheckTokenRoute::new());
}

#[actix_web::test]
async fn check_token_without_headers() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/check_token", configure).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. No access token was provided.");
}

#[actix_web::test]
async fn check_valid_token() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(42, vec![Role::User]);
    let (status, body) = get_request(&token, "/check_token", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Token is valid.");
}

#[actix_web::test]
async fn check_token_with_invalid_signature() {
    let _ = env_logger::try_init().ok();
    let mut token = issue_token(42, vec![Role::User]);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    let err = get_request(&token, "/check_token", configure).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. Access token signature is invalid. signature has failed verification");
}

#[actix_web::test]
async fn check_token_signed_with_another_secret() {
    let _ = env_logger::try_init().ok();
    let issuer = TokenIssuer::new(&AuthConfig::new(format!("{TEST_AUTH_SECRET}-but-not-quite")));
    let token = issuer.issue_token(42, vec![Role::User], None).unwrap();
    let err = get_request(&token, "/check_token", configure).await.expect_err("Expected error");
    assert!(err.contains("signature has failed verification"), "was: {err}");
}

#[actix_web::test]
async fn check_expired_token() {
    let _ = env_logger::try_init().ok();
    let issuer = TokenIssuer::new(&AuthConfig::new(TEST_AUTH_SECRET));
    let token = issuer.issue_token(42, vec![Role::User], Some(Duration::minutes(-1))).unwrap();
    let err = get_request(&token, "/check_token", configure).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. Access token has expired.");
}

#[actix_web::test]
async fn check_token_without_user_role() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(42, vec![]);
    let err = get_request(&token, "/check_token", configure).await.expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions.");
}

#[actix_web::test]
async fn check_unsigned_token() {
    let _ = env_logger::try_init().ok();
    let encode = |json: &str| base64::encode_config(json, base64::URL_SAFE_NO_PAD);
    let header = encode(r#"{"alg":"none","typ":"JWT"}"#);
    let claims = encode(r#"{"user_id":1,"roles":["user","admin"],"exp":4102444800}"#);
    let token = format!("{header}.{claims}.");
    let err = get_request(&token, "/check_token", configure).await.expect_err("Expected error");
    assert!(err.starts_with("Authentication Error."), "was: {err}");
}
