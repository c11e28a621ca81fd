//! Guest cart reconciliation and server-side cart editing.
use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    cart::{CartSnapshot, MergePolicy, MergedCart},
    db_types::CartItem,
    helpers::random_id,
    sf_api::errors::CartApiError,
    traits::{CartManagement, CatalogManagement},
};

/// Largest quantity accepted for a single cart line.
pub const MAX_LINE_QUANTITY: i64 = 10_000;

/// `CartApi` owns the account cart. The merge policy is fixed when the API is built, never chosen per request.
pub struct CartApi<B> {
    db: B,
    policy: MergePolicy,
}

impl<B: Debug> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi ({:?}, policy: {})", self.db, self.policy)
    }
}

impl<B> CartApi<B>
where B: CartManagement + CatalogManagement
{
    pub fn new(db: B, policy: MergePolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Merges a signed-in user's guest cart into their account cart.
    ///
    /// Retrying with the same `sync_id` is harmless: the snapshot is only ever merged once and a retry just returns
    /// the current cart. If the client sends no sync id a fresh one is generated, which makes the request
    /// non-idempotent.
    pub async fn sync_guest_cart(
        &self,
        user_id: i64,
        sync_id: Option<String>,
        items: Vec<CartItem>,
    ) -> Result<MergedCart, CartApiError> {
        validate_quantities(&items)?;
        let sync_id = match sync_id.map(|s| s.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => {
                warn!("🛒️ Guest cart sync for user #{user_id} arrived without a sync id. Retries will not be detected.");
                random_id("sync")
            },
        };
        let local = CartSnapshot::from_items(items);
        let result = self.db.merge_guest_cart(user_id, &sync_id, &local, self.policy).await?;
        if !result.applied {
            debug!("🛒️ Sync {sync_id} for user #{user_id} is a repeat. Nothing was merged.");
        }
        for w in &result.cart.warnings {
            info!(
                "🛒️ Cart of user #{user_id}: product {} {:?} (requested {}, available {})",
                w.product_id, w.kind, w.requested, w.available
            );
        }
        Ok(result.cart)
    }

    pub async fn fetch_cart(&self, user_id: i64) -> Result<Vec<CartItem>, CartApiError> {
        let items = self.db.fetch_cart(user_id).await?;
        Ok(items)
    }

    pub async fn set_item_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<CartItem, CartApiError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(CartApiError::ValidationError(format!(
                "Quantity must be between 1 and {MAX_LINE_QUANTITY}, got {quantity}"
            )));
        }
        let item = self.db.set_cart_item(user_id, product_id, quantity).await?;
        trace!("🛒️ User #{user_id} set product {product_id} to {quantity} at {}", Utc::now());
        Ok(item)
    }

    /// Removes a line. Returns false if the product was not in the cart.
    pub async fn remove_item(&self, user_id: i64, product_id: i64) -> Result<bool, CartApiError> {
        let removed = self.db.remove_cart_item(user_id, product_id).await?;
        Ok(removed)
    }
}

fn validate_quantities(items: &[CartItem]) -> Result<(), CartApiError> {
    match items.iter().find(|i| !(1..=MAX_LINE_QUANTITY).contains(&i.quantity)) {
        Some(bad) => Err(CartApiError::ValidationError(format!(
            "Quantity for product {} must be between 1 and {MAX_LINE_QUANTITY}, got {}",
            bad.product_id, bad.quantity
        ))),
        None => Ok(()),
    }
}
