mod hosted_checkout;

pub use hosted_checkout::{HostedCheckoutGateway, PAYMENT_SIGNATURE_HEADER};
