//! Order history and status management.
use std::fmt::Debug;

use log::*;

use crate::{
    checkout::{poll_for_order, PollOutcome, PollPolicy},
    db_types::{Order, OrderStatusType},
    sf_api::errors::OrderApiError,
    traits::OrderManagement,
};

pub struct OrderApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi ({:?})", self.db)
    }
}

impl<B> OrderApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches one of the user's orders. Orders belonging to someone else are reported as not found.
    pub async fn order_for_user(&self, user_id: i64, order_id: i64) -> Result<Option<Order>, OrderApiError> {
        let order = self.db.fetch_order(order_id).await?;
        Ok(order.filter(|o| o.user_id == user_id))
    }

    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderApiError> {
        let orders = self.db.fetch_orders_for_user(user_id).await?;
        Ok(orders)
    }

    /// The order committed for an online payment session, if the gateway has confirmed it yet.
    pub async fn order_for_session(&self, user_id: i64, session_id: &str) -> Result<Option<Order>, OrderApiError> {
        let order = self.db.fetch_order_by_session_id(session_id).await?;
        Ok(order.filter(|o| o.user_id == user_id))
    }

    /// Waits (boundedly) for the gateway callback to turn a payment session into an order.
    pub async fn wait_for_session_order(&self, user_id: i64, session_id: &str, policy: PollPolicy) -> PollOutcome {
        let outcome = poll_for_order(|| self.order_for_session(user_id, session_id), policy).await;
        if outcome == PollOutcome::NotFound {
            info!("🧾️ No order for session {session_id} yet. The shopper should check their order history.");
        }
        outcome
    }

    /// Admin only. Moves an order along its fulfilment lifecycle.
    pub async fn update_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderApiError> {
        let order = self.db.update_order_status(order_id, status).await?;
        info!("🧾️ Order #{order_id} is now {status}");
        Ok(order)
    }
}
