//! # Backend contracts
//!
//! The storefront core never talks to a database or a payment provider directly. It is written against the traits in
//! this module, and concrete backends (currently [`crate::SqliteDatabase`]) implement them.
//!
//! * [`CatalogManagement`] looks up products, their prices and the Inventory Ledger stock counts.
//! * [`CartManagement`] owns the per-user server-side cart, including the atomic guest cart merge.
//! * [`OtpManagement`] stores hashed one-time password challenges and consumes them atomically.
//! * [`OrderManagement`] provides queries over placed orders and the admin status transitions.
//! * [`CheckoutDatabase`] is the highest level contract. It commits orders against the inventory and tracks online
//!   payment sessions. A backend must implement all the other storage traits to be a `CheckoutDatabase`.
//! * [`PaymentGateway`] is the seam to the hosted payment provider.
mod cart_management;
mod catalog_management;
mod checkout_database;
mod order_management;
mod otp_management;
mod payment_gateway;

mod data_objects;

pub use cart_management::{CartManagement, CartStoreError};
pub use catalog_management::{CatalogError, CatalogManagement};
pub use checkout_database::{CheckoutDatabase, CheckoutDatabaseError};
pub use data_objects::{CartSyncResult, SessionCommitResult};
pub use order_management::{OrderManagement, OrderManagementError};
pub use otp_management::{OtpManagement, OtpStoreError};
pub use payment_gateway::{
    CallbackStatus,
    GatewayError,
    GatewaySession,
    PaymentCallback,
    PaymentGateway,
    SessionRequest,
};
