use thiserror::Error;

use crate::db_types::{NewProduct, Product};

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::DatabaseError(e.to_string())
    }
}

/// Read access to the product catalog and the Inventory Ledger.
///
/// Stock is never adjusted through this trait. The only way stock goes down is an order commit
/// (see [`crate::traits::CheckoutDatabase::commit_order`]).
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Fetches a single product with its current price and stock count.
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogError>;

    async fn fetch_products(&self) -> Result<Vec<Product>, CatalogError>;

    /// Adds a product to the catalog. Used for seeding and by the test suites.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogError>;
}
