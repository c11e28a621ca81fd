use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Money, PaymentMethod, QuotedLine};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The provider could not be reached or returned a server error. Safe to retry.
    #[error("Payment gateway is unavailable: {0}")]
    Unavailable(String),
    /// The provider refused the request.
    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Payment callback signature is invalid")]
    InvalidSignature,
    #[error("Payment callback could not be parsed: {0}")]
    MalformedCallback(String),
}

/// What we ask the provider to charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub user_id: i64,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub items: Vec<QuotedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySession {
    /// The hosted checkout page the shopper is redirected to.
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Paid,
    Failed,
    Expired,
}

impl Display for CallbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackStatus::Paid => write!(f, "paid"),
            CallbackStatus::Failed => write!(f, "failed"),
            CallbackStatus::Expired => write!(f, "expired"),
        }
    }
}

/// A verified notification from the provider about a payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub session_id: String,
    pub status: CallbackStatus,
}

/// The hosted payment provider. The storefront never sees card or UPI details; it only creates sessions and
/// verifies the provider's signed callbacks.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// A short name for the provider, recorded against sessions and orders.
    fn provider(&self) -> &str;

    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError>;

    /// Checks the callback signature and parses the body. Nothing in an unverified body is trusted.
    fn verify_callback(&self, signature: &str, body: &[u8]) -> Result<PaymentCallback, GatewayError>;
}
