use std::fmt::Display;

use thiserror::Error;

/// The lifecycle of a single checkout attempt.
///
/// `Draft` and `AwaitingProof` hold no reservations, so abandoning a checkout in either state needs no clean-up.
/// `Committing` is a single database transaction and can only end in `Placed` or `FailedRolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Draft,
    AwaitingProof,
    Committing,
    Placed,
    Rejected,
    FailedRolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// The cart, address and payment method passed validation.
    DraftAccepted,
    /// Validation failed or the proof (OTP, gateway session) was refused.
    Rejected,
    /// A valid OTP was presented or the gateway confirmed payment.
    ProofVerified,
    CommitSucceeded,
    CommitFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid checkout transition: {event:?} in state {from}")]
pub struct InvalidTransition {
    pub from: CheckoutState,
    pub event: CheckoutEvent,
}

impl CheckoutState {
    pub fn transition(self, event: CheckoutEvent) -> Result<CheckoutState, InvalidTransition> {
        use CheckoutEvent as Ev;
        use CheckoutState as St;
        match (self, event) {
            (St::Draft, Ev::DraftAccepted) => Ok(St::AwaitingProof),
            (St::Draft | St::AwaitingProof, Ev::Rejected) => Ok(St::Rejected),
            (St::AwaitingProof, Ev::ProofVerified) => Ok(St::Committing),
            (St::Committing, Ev::CommitSucceeded) => Ok(St::Placed),
            (St::Committing, Ev::CommitFailed) => Ok(St::FailedRolledBack),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Placed | CheckoutState::Rejected | CheckoutState::FailedRolledBack)
    }
}

impl Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutState::Draft => write!(f, "Draft"),
            CheckoutState::AwaitingProof => write!(f, "AwaitingProof"),
            CheckoutState::Committing => write!(f, "Committing"),
            CheckoutState::Placed => write!(f, "Placed"),
            CheckoutState::Rejected => write!(f, "Rejected"),
            CheckoutState::FailedRolledBack => write!(f, "FailedRolledBack"),
        }
    }
}
