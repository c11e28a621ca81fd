//! Access tokens.
//!
//! Shoppers sign in with the storefront's identity service, which issues the access token that this server checks.
//! Tokens are HS256 JWTs keyed with `SF_AUTH_SECRET`, which both sides share. The custom claims are
//! [`AccessClaims`]; the standard `exp` and `iat` claims carry the lifetime.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    prelude::*,
    ValidationError,
};
use log::*;
use serde::{Deserialize, Serialize};
use sf_common::Secret;
use storefront_engine::db_types::{Role, Roles};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: i64,
    pub roles: Roles,
}

impl AccessClaims {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

/// The authentication middleware puts verified claims into the request extensions. Handlers take them from there.
impl FromRequest for AccessClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<AccessClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::MissingToken)))
    }
}

/// Expiry is checked to the second.
fn time_options() -> TimeOptions {
    TimeOptions::new(Duration::zero(), Utc::now)
}

#[derive(Clone)]
pub struct TokenIssuer {
    key: Hs256Key,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self::from_secret(&config.auth_secret)
    }

    pub fn from_secret(secret: &Secret<String>) -> Self {
        Self { key: Hs256Key::new(secret.reveal().as_bytes()) }
    }

    /// Issue a new access token for the given user.
    /// This method DOES NOT check that the user exists or is entitled to the roles. That is the job of whoever
    /// calls it.
    pub fn issue_token(&self, user_id: i64, roles: Roles, duration: Option<Duration>) -> Result<String, AuthError> {
        let claims = Claims::new(AccessClaims { user_id, roles })
            .set_duration_and_issuance(&time_options(), duration.unwrap_or(DEFAULT_TOKEN_LIFETIME));
        let header = Header::empty().with_token_type("JWT");
        Hs256.token(&header, &claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }

    pub fn verify_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let untrusted =
            UntrustedToken::new(token.trim()).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let token: Token<AccessClaims> = Hs256.validator(&self.key).validate(&untrusted).map_err(validation_error)?;
        let claims = token.claims();
        claims.validate_expiration(&time_options()).map_err(|e| {
            debug!("🔐️ Access token for user #{} rejected. {e}", claims.custom.user_id);
            validation_error(e)
        })?;
        Ok(claims.custom.clone())
    }
}

fn validation_error(e: ValidationError) -> AuthError {
    match e {
        ValidationError::InvalidSignature => AuthError::ValidationError("signature has failed verification".into()),
        ValidationError::Expired | ValidationError::NoClaim(_) => AuthError::TokenExpired,
        other => AuthError::PoorlyFormattedToken(other.to_string()),
    }
}
