use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CartItem, Order, PaymentMethod, PaymentSessionStatus, StockShortfall},
    traits::GatewaySession,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: String,
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSessionRequest {
    pub payment_method: String,
    pub shipping_address: String,
}

/// A validated checkout draft. The cart is the persisted, post-merge server cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDraft {
    pub user_id: i64,
    pub cart: Vec<CartItem>,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// A cash on delivery order was committed.
    Placed(Order),
    /// An online payment session was opened. The order will be committed when the gateway confirms payment.
    AwaitingPayment(GatewaySession),
}

/// What happened when a verified gateway callback was processed. All of these are final: the gateway should not
/// retry any of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum WebhookOutcome {
    #[serde(rename_all = "camelCase")]
    OrderPlaced { order_id: i64 },
    #[serde(rename_all = "camelCase")]
    Duplicate { order_id: i64 },
    SessionClosed { status: PaymentSessionStatus },
    /// Paid, but the stock ran out before the order could be committed. Needs a refund.
    StockUnavailable { lines: Vec<StockShortfall> },
}
