mod confirmation;
mod state;

pub use confirmation::{poll_for_order, PollOutcome, PollPolicy};
pub use state::{CheckoutEvent, CheckoutState, InvalidTransition};
