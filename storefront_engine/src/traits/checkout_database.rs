use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewPaymentSession, Order, PaymentSession, PaymentSessionStatus, StockShortfall},
    traits::{
        data_objects::SessionCommitResult,
        CartManagement,
        CatalogManagement,
        OrderManagement,
        OtpManagement,
    },
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutDatabaseError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Insufficient stock for {} line(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),
    #[error("Cannot commit an order with no lines")]
    EmptyOrder,
    #[error("Payment session {0} does not exist")]
    SessionNotFound(String),
    #[error("Payment session {0} already exists")]
    SessionAlreadyExists(String),
}

impl From<sqlx::Error> for CheckoutDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref de) if de.is_unique_violation() => {
                CheckoutDatabaseError::DatabaseError(format!("Unique constraint violated: {de}"))
            },
            _ => CheckoutDatabaseError::DatabaseError(e.to_string()),
        }
    }
}

/// This trait defines the highest level of behaviour for storefront backends: turning carts into orders.
///
/// Every method that touches the Inventory Ledger runs in a single transaction whose first statement is a write, so
/// concurrent checkouts are serialised by the database and stock can never be oversold.
#[allow(async_fn_in_trait)]
pub trait CheckoutDatabase: Clone + CatalogManagement + CartManagement + OtpManagement + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Commits an order in a single atomic transaction:
    /// * every line's stock is decremented, but only if enough stock remains,
    /// * if any line is short, everything is rolled back and [`CheckoutDatabaseError::InsufficientStock`] lists every
    ///   failing line,
    /// * prices are snapshotted (the quoted price if the line has one, else the catalog price) and the total is
    ///   computed from them,
    /// * the order and its lines are stored with status `Placed`,
    /// * the ordered products are removed from the user's cart.
    async fn commit_order(&self, order: NewOrder) -> Result<Order, CheckoutDatabaseError>;

    /// Persists a new `Pending` payment session with its quoted lines.
    async fn insert_payment_session(&self, session: NewPaymentSession)
        -> Result<PaymentSession, CheckoutDatabaseError>;

    async fn fetch_payment_session(&self, session_id: &str) -> Result<Option<PaymentSession>, CheckoutDatabaseError>;

    /// Claims a pending session and commits its order.
    ///
    /// The claim (a `Pending` to `Completed` compare-and-set) is the first write of the transaction, so a callback
    /// delivered twice produces exactly one order. If stock is short, the order is rolled back, the session is marked
    /// `Failed` with the shortfall as its reason and `InsufficientStock` is returned.
    async fn commit_session_order(&self, session_id: &str) -> Result<SessionCommitResult, CheckoutDatabaseError>;

    /// Moves a pending session to `status` (`Failed` or `Expired`). Returns false if the session was not pending.
    async fn close_payment_session(
        &self,
        session_id: &str,
        status: PaymentSessionStatus,
        reason: Option<&str>,
    ) -> Result<bool, CheckoutDatabaseError>;

    /// Expires every pending session created before `created_before`. Returns the ids of the expired sessions.
    async fn expire_payment_sessions(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<String>, CheckoutDatabaseError>;
}
