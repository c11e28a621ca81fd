//! Guest-to-account cart reconciliation.
//!
//! When a shopper signs in, the cart they built anonymously (the *local* snapshot) has to be folded into the cart
//! already stored against their account (the *remote* snapshot). [`merge`] is pure and deterministic: every product
//! that appears in either snapshot appears exactly once in the result. [`clamp_to_stock`] then brings the merged
//! quantities in line with the inventory, recording a [`MergeWarning`] for every line it had to touch. Neither step
//! ever fails; stock is checked again, authoritatively, when the order is committed.
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::db_types::{CartItem, ConversionError};

/// How to combine two quantities for the same product. Chosen once per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Add the quantities. Nothing the shopper put in either cart is lost.
    #[default]
    Sum,
    /// Keep the larger quantity. For clients that replay the same logical edit into both carts.
    Max,
}

impl MergePolicy {
    fn combine(&self, local: i64, remote: i64) -> i64 {
        match self {
            MergePolicy::Sum => local.saturating_add(remote),
            MergePolicy::Max => local.max(remote),
        }
    }
}

impl Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergePolicy::Sum => write!(f, "sum"),
            MergePolicy::Max => write!(f, "max"),
        }
    }
}

impl FromStr for MergePolicy {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "max" => Ok(Self::Max),
            _ => Err(ConversionError::new("cart merge policy", s)),
        }
    }
}

//--------------------------------------     CartSnapshot      -------------------------------------------------------
/// A set of cart items with at most one entry per product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    items: BTreeMap<i64, CartItem>,
}

impl CartSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a list of items. Repeated product ids are folded into one line by summing the
    /// quantities and keeping the latest modification time.
    pub fn from_items<I: IntoIterator<Item = CartItem>>(items: I) -> Self {
        let mut result = Self::new();
        for item in items {
            result.add(item);
        }
        result
    }

    pub fn add(&mut self, item: CartItem) {
        match self.items.get_mut(&item.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                existing.last_modified_at = existing.last_modified_at.max(item.last_modified_at);
            },
            None => {
                self.items.insert(item.product_id, item);
            },
        }
    }

    pub fn get(&self, product_id: i64) -> Option<&CartItem> {
        self.items.get(&product_id)
    }

    pub fn items(&self) -> impl Iterator<Item = &CartItem> {
        self.items.values()
    }

    pub fn into_items(self) -> Vec<CartItem> {
        self.items.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.values().map(|i| i.quantity).sum()
    }
}

//--------------------------------------      MergedCart       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeWarningKind {
    /// The quantity was reduced to what is in stock.
    Clamped,
    /// The product is out of stock and the line was dropped.
    Removed,
    /// The product is not in the catalog and the line was dropped.
    UnknownProduct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeWarning {
    pub product_id: i64,
    pub requested: i64,
    pub available: i64,
    pub kind: MergeWarningKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedCart {
    pub items: Vec<CartItem>,
    pub warnings: Vec<MergeWarning>,
}

impl MergedCart {
    /// A cart that went through no reconciliation, e.g. a repeated sync request.
    pub fn unchanged(items: Vec<CartItem>) -> Self {
        Self { items, warnings: vec![] }
    }

    pub fn quantity_of(&self, product_id: i64) -> Option<i64> {
        self.items.iter().find(|i| i.product_id == product_id).map(|i| i.quantity)
    }
}

/// Merges the guest cart into the account cart.
///
/// Lines present in only one snapshot are carried forward unchanged. Lines present in both are combined according to
/// `policy` and take the later of the two modification times.
pub fn merge(local: &CartSnapshot, remote: &CartSnapshot, policy: MergePolicy) -> MergedCart {
    let mut merged = remote.items.clone();
    for item in local.items() {
        match merged.get_mut(&item.product_id) {
            Some(existing) => {
                existing.quantity = policy.combine(item.quantity, existing.quantity);
                existing.last_modified_at = existing.last_modified_at.max(item.last_modified_at);
            },
            None => {
                merged.insert(item.product_id, item.clone());
            },
        }
    }
    MergedCart::unchanged(merged.into_values().collect())
}

/// Reduces every line to what `stock_of` says is available.
///
/// `stock_of` returns `None` for products that are not in the catalog. Lines are clamped, removed or dropped, never
/// rejected; a warning is appended to the cart for each adjustment.
pub fn clamp_to_stock<F>(cart: MergedCart, stock_of: F) -> MergedCart
where F: Fn(i64) -> Option<i64> {
    let MergedCart { items, mut warnings } = cart;
    let mut kept = Vec::with_capacity(items.len());
    for mut item in items {
        let requested = item.quantity;
        match stock_of(item.product_id) {
            None => warnings.push(MergeWarning {
                product_id: item.product_id,
                requested,
                available: 0,
                kind: MergeWarningKind::UnknownProduct,
            }),
            Some(available) if available <= 0 => warnings.push(MergeWarning {
                product_id: item.product_id,
                requested,
                available: 0,
                kind: MergeWarningKind::Removed,
            }),
            Some(available) if available < requested => {
                warnings.push(MergeWarning {
                    product_id: item.product_id,
                    requested,
                    available,
                    kind: MergeWarningKind::Clamped,
                });
                item.quantity = available;
                kept.push(item);
            },
            Some(_) => kept.push(item),
        }
    }
    MergedCart { items: kept, warnings }
}
