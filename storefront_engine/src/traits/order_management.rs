use thiserror::Error;

use crate::db_types::{Order, OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum OrderManagementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("An order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatusType, to: OrderStatusType },
}

impl From<sqlx::Error> for OrderManagementError {
    fn from(e: sqlx::Error) -> Self {
        OrderManagementError::DatabaseError(e.to_string())
    }
}

/// Queries over placed orders.
///
/// Orders are immutable once placed. The only permitted change is a status transition that
/// [`OrderStatusType::can_transition_to`] allows.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderManagementError>;

    /// Fetches the order that was committed for the given online payment session, if it exists yet.
    async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, OrderManagementError>;

    /// The user's order history, newest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError>;

    async fn update_order_status(&self, order_id: i64, status: OrderStatusType)
        -> Result<Order, OrderManagementError>;
}
