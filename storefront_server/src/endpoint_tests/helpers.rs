use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;
use serde_json::Value;
use sf_common::Secret;
use storefront_engine::db_types::Role;

use crate::{
    auth::TokenIssuer,
    config::AuthConfig,
    middleware::{AuthenticationMiddlewareFactory, ACCESS_TOKEN_HEADER},
    server::json_config,
};

// DO NOT re-use this secret anywhere.
pub const TEST_AUTH_SECRET: &str = "endpoint-tests-only-4b7e0f0d2c9a";

pub fn issue_token(user_id: i64, roles: Vec<Role>) -> String {
    let issuer = TokenIssuer::new(&AuthConfig::new(TEST_AUTH_SECRET));
    issuer.issue_token(user_id, roles, None).expect("Failed to sign token")
}

/// Sends `req` to an app built by `configure`, behind the authentication middleware.
///
/// Middleware rejections (no token, bad token, missing role) surface as `Err` with the error message, just like
/// they would abort the request in the server. Handler errors are ordinary responses.
pub async fn send_request<F>(auth_header: &str, req: TestRequest, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    let mut req = req;
    if !auth_header.is_empty() {
        req = req.insert_header((ACCESS_TOKEN_HEADER, auth_header));
    }
    let app = App::new()
        .wrap(AuthenticationMiddlewareFactory::new(Secret::new(TEST_AUTH_SECRET.to_string())))
        .app_data(json_config())
        .configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

/// As [`send_request`], for routes that live outside the authenticated scope.
pub async fn send_public_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().app_data(json_config()).configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::call_service(&service, req.to_request()).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub async fn get_request<F>(auth_header: &str, path: &str, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    send_request(auth_header, TestRequest::get().uri(path), configure).await
}

pub async fn post_request<F>(
    auth_header: &str,
    path: &str,
    body: Value,
    configure: F,
) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
{
    send_request(auth_header, TestRequest::post().uri(path).set_json(body), configure).await
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response was not JSON ({e}): {body}"))
}
