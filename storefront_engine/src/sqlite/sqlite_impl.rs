//! `SqliteDatabase` is the concrete storefront backend.
//!
//! It implements every trait in [`crate::traits`]. Reads run on a pooled connection. Every write opens a
//! transaction, composes the low-level functions in [`super::db`] and commits, so that the change is visible to the
//! other pooled connections as soon as the method returns.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{carts, db_url, new_pool, orders, otp, payment_sessions, products};
use crate::{
    cart::{clamp_to_stock, merge, CartSnapshot, MergePolicy, MergedCart},
    db_types::{
        CartItem,
        ConsumeChallengeResult,
        NewOrder,
        NewOrderLine,
        NewOtpChallenge,
        NewPaymentSession,
        NewProduct,
        Order,
        OrderStatusType,
        OtpChallenge,
        OtpPurpose,
        PaymentDetails,
        PaymentSession,
        PaymentSessionStatus,
        Product,
    },
    traits::{
        CartManagement,
        CartStoreError,
        CartSyncResult,
        CatalogError,
        CatalogManagement,
        CheckoutDatabase,
        CheckoutDatabaseError,
        OrderManagement,
        OrderManagementError,
        OtpManagement,
        OtpStoreError,
        SessionCommitResult,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(&mut conn).await?;
        Ok(products)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        if product.price.is_negative() || product.stock < 0 {
            return Err(CatalogError::InvalidProduct(format!("{} has a negative price or stock", product.name)));
        }
        let mut tx = self.pool.begin().await?;
        let product = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Product #{} ({}) added with {} units in stock", product.id, product.name, product.stock);
        Ok(product)
    }
}

impl CartManagement for SqliteDatabase {
    async fn fetch_cart(&self, user_id: i64) -> Result<Vec<CartItem>, CartStoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = carts::fetch_cart(user_id, &mut conn).await?;
        Ok(items)
    }

    async fn replace_cart(&self, user_id: i64, items: &[CartItem]) -> Result<(), CartStoreError> {
        let mut tx = self.pool.begin().await?;
        carts::replace_cart(user_id, items, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn merge_guest_cart(
        &self,
        user_id: i64,
        sync_id: &str,
        local: &CartSnapshot,
        policy: MergePolicy,
    ) -> Result<CartSyncResult, CartStoreError> {
        let mut tx = self.pool.begin().await?;
        // Recording the sync id is the first write. It takes the write lock and deduplicates in one step.
        if !carts::record_sync(sync_id, user_id, Utc::now(), &mut tx).await? {
            let items = carts::fetch_cart(user_id, &mut tx).await?;
            tx.commit().await?;
            info!("🛒️ Guest cart {sync_id} was already merged for user #{user_id}. Returning the current cart.");
            return Ok(CartSyncResult { cart: MergedCart::unchanged(items), applied: false });
        }
        let remote = CartSnapshot::from_items(carts::fetch_cart(user_id, &mut tx).await?);
        let merged = merge(local, &remote, policy);
        let ids = merged.items.iter().map(|i| i.product_id).collect::<Vec<_>>();
        let stock = products::stock_levels(&ids, &mut tx).await?;
        let merged = clamp_to_stock(merged, |id| stock.get(&id).copied());
        carts::replace_cart(user_id, &merged.items, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🛒️ Merged {} guest lines into the cart of user #{user_id} ({policy}). {} lines, {} warnings",
            local.len(),
            merged.items.len(),
            merged.warnings.len()
        );
        Ok(CartSyncResult { cart: merged, applied: true })
    }

    async fn set_cart_item(&self, user_id: i64, product_id: i64, quantity: i64) -> Result<CartItem, CartStoreError> {
        let mut tx = self.pool.begin().await?;
        if products::fetch_product(product_id, &mut tx).await?.is_none() {
            return Err(CartStoreError::UnknownProduct(product_id));
        }
        let item = carts::upsert_item(user_id, product_id, quantity, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn remove_cart_item(&self, user_id: i64, product_id: i64) -> Result<bool, CartStoreError> {
        let mut tx = self.pool.begin().await?;
        let removed = carts::remove_item(user_id, product_id, &mut tx).await?;
        tx.commit().await?;
        Ok(removed)
    }
}

impl OtpManagement for SqliteDatabase {
    async fn insert_challenge(&self, challenge: NewOtpChallenge) -> Result<OtpChallenge, OtpStoreError> {
        let mut tx = self.pool.begin().await?;
        let discarded = otp::discard_live_challenges(challenge.user_id, challenge.purpose, &mut tx).await?;
        let challenge = otp::insert_challenge(challenge, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        trace!(
            "🔐️ Challenge #{} stored for user #{}. {discarded} older challenges discarded",
            challenge.id,
            challenge.user_id
        );
        Ok(challenge)
    }

    async fn consume_challenge(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
        code_hash: &str,
        max_attempts: i64,
        now: DateTime<Utc>,
    ) -> Result<ConsumeChallengeResult, OtpStoreError> {
        let mut tx = self.pool.begin().await?;
        // compare-and-consume first, so that the transaction holds the write lock from the start
        if let Some(expires_at) = otp::consume_matching(user_id, purpose, code_hash, now, &mut tx).await? {
            tx.commit().await?;
            return if expires_at <= now {
                Ok(ConsumeChallengeResult::MatchedButExpired)
            } else {
                Ok(ConsumeChallengeResult::Consumed)
            };
        }
        let result = match otp::fetch_live_challenge(user_id, purpose, &mut tx).await? {
            None => ConsumeChallengeResult::NoChallenge,
            Some(challenge) if challenge.is_expired(now) => ConsumeChallengeResult::Expired,
            Some(challenge) => {
                let attempts = otp::record_failed_attempt(challenge.id, max_attempts, now, &mut tx).await?;
                ConsumeChallengeResult::Mismatch { burned: attempts >= max_attempts }
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn purge_otp_challenges(&self, now: DateTime<Utc>) -> Result<u64, OtpStoreError> {
        let mut tx = self.pool.begin().await?;
        let purged = otp::purge(now, &mut tx).await?;
        tx.commit().await?;
        Ok(purged)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_session_id(session_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatusType,
    ) -> Result<Order, OrderManagementError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or(OrderManagementError::OrderNotFound(order_id))?;
        let invalid = OrderManagementError::InvalidStatusTransition { from: order.status, to: status };
        if !order.status.can_transition_to(status) {
            return Err(invalid);
        }
        // The guarded update fails if someone else changed the status after we read it
        if !orders::update_order_status(order_id, order.status, status, Utc::now(), &mut tx).await? {
            return Err(invalid);
        }
        let updated =
            orders::fetch_order(order_id, &mut tx).await?.ok_or(OrderManagementError::OrderNotFound(order_id))?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} moved from {} to {status}", order.status);
        Ok(updated)
    }
}

impl CheckoutDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn commit_order(&self, order: NewOrder) -> Result<Order, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        // On error the transaction is dropped, which rolls back every decrement
        let order = orders::commit_order(order, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn insert_payment_session(
        &self,
        session: NewPaymentSession,
    ) -> Result<PaymentSession, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let id = session.session_id.clone();
        let session = payment_sessions::insert_session(session, Utc::now(), &mut tx).await.map_err(|e| match e {
            sqlx::Error::Database(de) if de.is_unique_violation() => CheckoutDatabaseError::SessionAlreadyExists(id),
            e => e.into(),
        })?;
        tx.commit().await?;
        debug!("🗃️ Payment session {} stored for user #{} ({})", session.session_id, session.user_id, session.amount);
        Ok(session)
    }

    async fn fetch_payment_session(&self, session_id: &str) -> Result<Option<PaymentSession>, CheckoutDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let session = payment_sessions::fetch_session(session_id, &mut conn).await?;
        Ok(session)
    }

    async fn commit_session_order(&self, session_id: &str) -> Result<SessionCommitResult, CheckoutDatabaseError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if !payment_sessions::claim_session(session_id, now, &mut tx).await? {
            let existing = payment_sessions::fetch_session(session_id, &mut tx).await?;
            tx.commit().await?;
            let session = existing.ok_or_else(|| CheckoutDatabaseError::SessionNotFound(session_id.to_string()))?;
            return match (session.status, session.order_id) {
                (PaymentSessionStatus::Completed, Some(order_id)) => {
                    info!("🗃️ Payment session {session_id} was already committed as order #{order_id}");
                    Ok(SessionCommitResult::Duplicate(order_id))
                },
                (status, _) => Ok(SessionCommitResult::Closed(status)),
            };
        }
        let session = payment_sessions::fetch_session(session_id, &mut tx)
            .await?
            .ok_or_else(|| CheckoutDatabaseError::SessionNotFound(session_id.to_string()))?;
        let order = NewOrder {
            user_id: session.user_id,
            lines: session
                .items
                .iter()
                .map(|l| NewOrderLine {
                    product_id: l.product_id,
                    quantity: l.quantity,
                    quoted_price: Some(l.unit_price),
                })
                .collect(),
            shipping_address: session.shipping_address.clone(),
            payment_method: session.payment_method,
            payment_details: PaymentDetails::Online {
                provider: session.provider.clone(),
                session_id: session.session_id.clone(),
            },
            session_id: Some(session.session_id.clone()),
        };
        match orders::commit_order(order, now, &mut tx).await {
            Ok(order) => {
                payment_sessions::link_order(session_id, order.id, now, &mut tx).await?;
                tx.commit().await?;
                Ok(SessionCommitResult::Placed(order))
            },
            Err(CheckoutDatabaseError::InsufficientStock(short)) => {
                tx.rollback().await?;
                let reason = short.iter().map(|s| s.to_string()).collect::<Vec<_>>().join("; ");
                let reason = format!("Insufficient stock after payment: {reason}");
                let mut tx = self.pool.begin().await?;
                payment_sessions::transition(session_id, PaymentSessionStatus::Failed, Some(&reason), now, &mut tx)
                    .await?;
                tx.commit().await?;
                warn!("🗃️ Payment session {session_id} could not be committed. {reason}");
                Err(CheckoutDatabaseError::InsufficientStock(short))
            },
            Err(e) => Err(e),
        }
    }

    async fn close_payment_session(
        &self,
        session_id: &str,
        status: PaymentSessionStatus,
        reason: Option<&str>,
    ) -> Result<bool, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let closed = payment_sessions::transition(session_id, status, reason, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(closed)
    }

    async fn expire_payment_sessions(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<String>, CheckoutDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let expired = payment_sessions::expire_sessions(created_before, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(expired)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SF_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
