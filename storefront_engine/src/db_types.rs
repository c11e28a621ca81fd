use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
pub use sf_common::Money;
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    pub fn new<S: Into<String>>(kind: &'static str, value: S) -> Self {
        Self { kind, value: value.into() }
    }
}

//--------------------------------------        Product        -------------------------------------------------------
/// A catalog entry together with its Inventory Ledger stock count.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Money, stock: i64) -> Self {
        Self { name: name.into(), price, stock }
    }
}

//--------------------------------------        CartItem       -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(rename = "modifiedAt", alias = "lastModifiedAt")]
    pub last_modified_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(product_id: i64, quantity: i64, last_modified_at: DateTime<Utc>) -> Self {
        Self { product_id, quantity, last_modified_at }
    }
}

//--------------------------------------     StockShortfall    -------------------------------------------------------
/// A single order line that could not be satisfied from the Inventory Ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub product_id: i64,
    pub requested: i64,
    /// `None` if the product does not exist at all.
    pub available: Option<i64>,
}

impl Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.available {
            Some(n) => write!(f, "product {} (requested {}, available {n})", self.product_id, self.requested),
            None => write!(f, "product {} (requested {}, no such product)", self.product_id, self.requested),
        }
    }
}

//--------------------------------------     PaymentMethod     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery. Intent is proven with a one-time password.
    Cod,
    Card,
    Upi,
}

impl PaymentMethod {
    /// Online methods are proven by the payment gateway rather than an OTP.
    pub fn is_online(&self) -> bool {
        !matches!(self, PaymentMethod::Cod)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" => Ok(Self::Cod),
            "card" => Ok(Self::Card),
            "upi" => Ok(Self::Upi),
            _ => Err(ConversionError::new("payment method", s)),
        }
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been committed against the inventory and is awaiting fulfilment.
    Placed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatusType {
    /// Orders are immutable apart from these forward-only status changes.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!((self, next), (Placed, Shipped) | (Placed, Cancelled) | (Shipped, Delivered) | (Shipped, Cancelled))
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Placed => write!(f, "Placed"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Placed" => Ok(Self::Placed),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            _ => Err(ConversionError::new("order status", s)),
        }
    }
}

//--------------------------------------    PaymentDetails     -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaymentDetails {
    #[serde(rename_all = "camelCase")]
    CashOnDelivery { otp_verified_at: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    Online { provider: String, session_id: String },
}

//--------------------------------------         Order         -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i64,
    pub price_at_purchase: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.price_at_purchase * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub items: Vec<OrderLine>,
    pub total_amount: Money,
    pub status: OrderStatusType,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order that is about to be committed.
///
/// When `quoted_price` is set (online payments), that price is what the customer was charged and becomes the
/// `price_at_purchase`. Otherwise the catalog price at commit time is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i64,
    pub quoted_price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: i64,
    pub lines: Vec<NewOrderLine>,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub session_id: Option<String>,
}

impl NewOrder {
    pub fn from_cart(
        user_id: i64,
        cart: &[CartItem],
        shipping_address: String,
        payment_method: PaymentMethod,
        payment_details: PaymentDetails,
    ) -> Self {
        let lines = cart
            .iter()
            .map(|i| NewOrderLine { product_id: i.product_id, quantity: i.quantity, quoted_price: None })
            .collect();
        Self { user_id, lines, shipping_address, payment_method, payment_details, session_id: None }
    }
}

//--------------------------------------      OtpPurpose       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    PlaceOrder,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::PlaceOrder => "place_order",
        }
    }
}

impl Display for OtpPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "place_order" => Ok(Self::PlaceOrder),
            _ => Err(ConversionError::new("OTP purpose", s)),
        }
    }
}

//--------------------------------------     OtpChallenge      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OtpChallenge {
    pub id: i64,
    pub user_id: i64,
    pub purpose: String,
    pub code_hash: String,
    pub attempts: i64,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOtpChallenge {
    pub user_id: i64,
    pub purpose: OtpPurpose,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// The outcome of presenting a code hash against the live challenge for a `(user, purpose)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeChallengeResult {
    /// The code matched an unexpired challenge, which is now consumed.
    Consumed,
    /// The code matched, but the challenge had already expired. It is consumed regardless.
    MatchedButExpired,
    /// The code did not match and the live challenge has expired.
    Expired,
    /// The code did not match. `burned` is true if this attempt exhausted the challenge.
    Mismatch { burned: bool },
    /// There is no live challenge for this user and purpose.
    NoChallenge,
}

//--------------------------------------    PaymentSession     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentSessionStatus {
    /// Waiting for the gateway to confirm payment.
    Pending,
    /// The payment was confirmed and the order committed.
    Completed,
    /// The payment failed, or the commit was rolled back after payment.
    Failed,
    /// No confirmation arrived before the session timed out.
    Expired,
}

impl Display for PaymentSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentSessionStatus::Pending => write!(f, "Pending"),
            PaymentSessionStatus::Completed => write!(f, "Completed"),
            PaymentSessionStatus::Failed => write!(f, "Failed"),
            PaymentSessionStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for PaymentSessionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Expired" => Ok(Self::Expired),
            _ => Err(ConversionError::new("payment session status", s)),
        }
    }
}

/// A cart line with the unit price quoted to the customer when the payment session was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentSession {
    pub session_id: String,
    pub provider: String,
    pub user_id: i64,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub amount: Money,
    pub items: Vec<QuotedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub session_id: String,
    pub provider: String,
    pub user_id: i64,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub amount: Money,
    pub items: Vec<QuotedLine>,
    pub status: PaymentSessionStatus,
    pub order_id: Option<i64>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------         Role          -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(ConversionError::new("role", s)),
        }
    }
}

pub type Roles = Vec<Role>;
