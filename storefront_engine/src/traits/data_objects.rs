use crate::{
    cart::MergedCart,
    db_types::{Order, PaymentSessionStatus},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSyncResult {
    pub cart: MergedCart,
    /// False when the sync id had already been applied and the guest snapshot was ignored.
    pub applied: bool,
}

/// The outcome of claiming a payment session after the gateway confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommitResult {
    /// This call claimed the session and committed the order.
    Placed(Order),
    /// The session had already been claimed. Carries the id of the order that was committed then.
    Duplicate(i64),
    /// The session was closed (failed or expired) before the confirmation arrived.
    Closed(PaymentSessionStatus),
}
