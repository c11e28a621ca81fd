use thiserror::Error;

use crate::{
    checkout::InvalidTransition,
    db_types::{OrderStatusType, StockShortfall},
    traits::{
        CartStoreError,
        CatalogError,
        CheckoutDatabaseError,
        GatewayError,
        OrderManagementError,
        OtpStoreError,
    },
};

#[derive(Debug, Clone, Error)]
pub enum CartApiError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Product {0} does not exist")]
    UnknownProduct(i64),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<CartStoreError> for CartApiError {
    fn from(e: CartStoreError) -> Self {
        match e {
            CartStoreError::DatabaseError(s) => CartApiError::DatabaseError(s),
            CartStoreError::UnknownProduct(id) => CartApiError::UnknownProduct(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("OTP is invalid")]
    OtpInvalid,
    #[error("OTP has expired")]
    OtpExpired,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<OtpStoreError> for OtpError {
    fn from(e: OtpStoreError) -> Self {
        match e {
            OtpStoreError::DatabaseError(s) => OtpError::DatabaseError(s),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    ValidationError(String),
    #[error("OTP is invalid")]
    OtpInvalid,
    #[error("OTP has expired")]
    OtpExpired,
    #[error("Insufficient stock for {} line(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),
    #[error("Payment gateway is unavailable. Please try again. {0}")]
    GatewayUnavailable(String),
    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),
    #[error("Payment callback signature is invalid")]
    InvalidCallbackSignature,
    #[error("Payment session {0} does not exist")]
    SessionNotFound(String),
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransition),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<OtpError> for CheckoutError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::OtpInvalid => CheckoutError::OtpInvalid,
            OtpError::OtpExpired => CheckoutError::OtpExpired,
            OtpError::DatabaseError(s) => CheckoutError::DatabaseError(s),
        }
    }
}

impl From<CheckoutDatabaseError> for CheckoutError {
    fn from(e: CheckoutDatabaseError) -> Self {
        match e {
            CheckoutDatabaseError::InsufficientStock(lines) => CheckoutError::InsufficientStock(lines),
            CheckoutDatabaseError::EmptyOrder => CheckoutError::ValidationError("Your cart is empty".into()),
            CheckoutDatabaseError::SessionNotFound(id) => CheckoutError::SessionNotFound(id),
            CheckoutDatabaseError::SessionAlreadyExists(id) => {
                CheckoutError::GatewayRejected(format!("The gateway reused session id {id}"))
            },
            CheckoutDatabaseError::DatabaseError(s) => CheckoutError::DatabaseError(s),
        }
    }
}

impl From<CartStoreError> for CheckoutError {
    fn from(e: CartStoreError) -> Self {
        match e {
            CartStoreError::UnknownProduct(id) => {
                CheckoutError::ValidationError(format!("Product {id} does not exist"))
            },
            CartStoreError::DatabaseError(s) => CheckoutError::DatabaseError(s),
        }
    }
}

impl From<CatalogError> for CheckoutError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::DatabaseError(s) => CheckoutError::DatabaseError(s),
            CatalogError::InvalidProduct(s) => CheckoutError::ValidationError(s),
        }
    }
}

impl From<GatewayError> for CheckoutError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable(s) => CheckoutError::GatewayUnavailable(s),
            GatewayError::Rejected(s) => CheckoutError::GatewayRejected(s),
            GatewayError::InvalidSignature => CheckoutError::InvalidCallbackSignature,
            GatewayError::MalformedCallback(s) => CheckoutError::ValidationError(s),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderApiError {
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("An order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<OrderManagementError> for OrderApiError {
    fn from(e: OrderManagementError) -> Self {
        match e {
            OrderManagementError::DatabaseError(s) => OrderApiError::DatabaseError(s),
            OrderManagementError::OrderNotFound(id) => OrderApiError::OrderNotFound(id),
            OrderManagementError::InvalidStatusTransition { from, to } => {
                OrderApiError::InvalidStatusTransition { from, to }
            },
        }
    }
}
