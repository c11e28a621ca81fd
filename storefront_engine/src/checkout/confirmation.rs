use std::{fmt::Display, future::Future, time::Duration};

use log::*;

use crate::db_types::Order;

/// How long to wait for an online order to appear after the gateway redirects the shopper back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, interval: Duration::from_secs(2) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Found(Order),
    /// The webhook has not landed yet. The shopper should be pointed at their order history.
    NotFound,
}

/// Polls `lookup` until it yields an order or `policy.max_attempts` is exhausted.
///
/// Lookup errors count as a miss; they are logged and polling continues.
pub async fn poll_for_order<F, Fut, E>(mut lookup: F, policy: PollPolicy) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<Order>, E>>,
    E: Display,
{
    for attempt in 1..=policy.max_attempts {
        match lookup().await {
            Ok(Some(order)) => {
                debug!("🧾️ Order #{} found after {attempt} attempts", order.id);
                return PollOutcome::Found(order);
            },
            Ok(None) => trace!("🧾️ No order yet (attempt {attempt}/{})", policy.max_attempts),
            Err(e) => warn!("🧾️ Order lookup failed on attempt {attempt}: {e}"),
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    PollOutcome::NotFound
}
