use thiserror::Error;

use crate::{
    cart::{CartSnapshot, MergePolicy},
    db_types::CartItem,
    traits::data_objects::CartSyncResult,
};

#[derive(Debug, Clone, Error)]
pub enum CartStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    UnknownProduct(i64),
}

impl From<sqlx::Error> for CartStoreError {
    fn from(e: sqlx::Error) -> Self {
        CartStoreError::DatabaseError(e.to_string())
    }
}

/// The server-side cart of each signed-in user. There is at most one line per product.
#[allow(async_fn_in_trait)]
pub trait CartManagement {
    /// The user's cart, ordered by product id.
    async fn fetch_cart(&self, user_id: i64) -> Result<Vec<CartItem>, CartStoreError>;

    /// Atomically replaces the entire cart.
    async fn replace_cart(&self, user_id: i64, items: &[CartItem]) -> Result<(), CartStoreError>;

    /// Merges a guest cart snapshot into the user's cart in a single transaction.
    ///
    /// * The `sync_id` is recorded first. If it has been applied before, nothing is merged and the current cart is
    ///   returned with `applied = false`.
    /// * Otherwise the stored cart is merged with `local` using `policy`, clamped to the available stock and written
    ///   back.
    async fn merge_guest_cart(
        &self,
        user_id: i64,
        sync_id: &str,
        local: &CartSnapshot,
        policy: MergePolicy,
    ) -> Result<CartSyncResult, CartStoreError>;

    /// Sets the quantity for one product, adding the line if needed. The product must exist.
    async fn set_cart_item(&self, user_id: i64, product_id: i64, quantity: i64) -> Result<CartItem, CartStoreError>;

    /// Removes one line from the cart. Returns false if the product was not in the cart.
    async fn remove_cart_item(&self, user_id: i64, product_id: i64) -> Result<bool, CartStoreError>;
}
