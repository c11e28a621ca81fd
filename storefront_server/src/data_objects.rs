use std::fmt::Display;

use serde::{Deserialize, Serialize};
use storefront_engine::{db_types::OrderStatusType, traits::GatewaySession};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `PUT /api/cart/items/{product_id}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: i64,
}

/// Body of the admin order status route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatusType,
}

/// The response to `POST /api/orders` for online payment methods. The client sends the shopper to `redirect_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRedirect {
    pub redirect_url: String,
    pub session_id: String,
}

impl From<GatewaySession> for PaymentRedirect {
    fn from(session: GatewaySession) -> Self {
        Self { redirect_url: session.url, session_id: session.session_id }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionOrderParams {
    /// Wait (a bounded time) for the gateway callback if the order does not exist yet.
    #[serde(default)]
    pub wait: bool,
}
