//! # Storefront public API
//!
//! The `sf_api` module is the programmatic API of the storefront core. Each API is created by supplying a backend
//! that implements the traits it needs, so the HTTP layer (or a test) can pick the pieces it wants:
//!
//! * [`cart_api`] reconciles guest carts with account carts and edits the server-side cart.
//! * [`otp_api`] issues and validates one-time passwords.
//! * [`checkout_api`] turns a cart into an order, either directly (cash on delivery) or through a payment gateway
//!   session and its callback.
//! * [`order_api`] provides order history queries and admin status changes.
//!
//! ```rust,ignore
//! use storefront_engine::{CartApi, SqliteDatabase, cart::MergePolicy};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = CartApi::new(db, MergePolicy::Sum);
//! let merged = api.sync_guest_cart(user_id, Some(sync_id), guest_items).await?;
//! ```
pub mod cart_api;
pub mod checkout_api;
pub mod checkout_objects;
pub mod errors;
pub mod order_api;
pub mod otp_api;
