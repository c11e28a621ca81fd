//! Storefront Engine
//!
//! The storefront engine is the checkout core of an e-commerce storefront. It reconciles the anonymous cart a shopper
//! builds before signing in with the cart stored against their account, and turns the result into an immutable order
//! without double-counting quantities, double-charging or overselling stock.
//!
//! The library is divided into these sections:
//! 1. Pure domain logic. [`mod@cart`] holds the cart merge algorithm and the client-side sync session state machine;
//!    [`mod@checkout`] holds the checkout state machine and bounded confirmation polling. None of it touches I/O.
//! 2. Backend contracts ([`mod@traits`]) and the SQLite backend ([`SqliteDatabase`]). The data types stored by the
//!    backends live in [`mod@db_types`].
//! 3. The public API (`sf_api`): [`CartApi`], [`OtpApi`], [`CheckoutApi`] and [`OrderApi`]. These are what the HTTP
//!    server calls.
//!
//! The engine also emits events ([`mod@events`]) when something happens that the outside world cares about: an OTP was
//! issued and must be delivered, an order was placed, or a paid checkout could not be committed. Hooks subscribe to
//! these without ever blocking the request that caused them.
pub mod cart;
pub mod checkout;
pub mod db_types;
pub mod events;
pub mod helpers;
mod sf_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use sf_api::{
    cart_api::CartApi,
    checkout_api::CheckoutApi,
    checkout_objects,
    errors::{CartApiError, CheckoutError, OrderApiError, OtpError},
    order_api::OrderApi,
    otp_api::{OtpApi, OtpSettings},
};
