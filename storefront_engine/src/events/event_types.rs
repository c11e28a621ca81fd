use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OtpPurpose, StockShortfall};

/// Emitted after a one-time password has been issued. This is the only place the plaintext code exists outside the
/// verifier, so the subscriber of this event is responsible for delivering it to the user.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpIssuedEvent {
    pub user_id: i64,
    pub purpose: OtpPurpose,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for OtpIssuedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpIssuedEvent")
            .field("user_id", &self.user_id)
            .field("purpose", &self.purpose)
            .field("code", &"******")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order: Order,
}

impl OrderPlacedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted when money may have been taken but no order could be committed. These need manual follow-up (refunds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutFailedEvent {
    pub user_id: i64,
    pub session_id: Option<String>,
    pub reason: String,
    pub shortfall: Vec<StockShortfall>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OtpIssued(OtpIssuedEvent),
    OrderPlaced(OrderPlacedEvent),
    CheckoutFailed(CheckoutFailedEvent),
}
