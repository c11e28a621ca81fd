use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use super::{decode_err, products};
use crate::{
    db_types::{
        Money,
        NewOrder,
        NewOrderLine,
        Order,
        OrderLine,
        OrderStatusType,
        PaymentDetails,
        PaymentMethod,
        StockShortfall,
    },
    traits::CheckoutDatabaseError,
};

const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, shipping_address, payment_method, payment_details, \
                             session_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    total_amount: Money,
    status: String,
    shipping_address: String,
    payment_method: String,
    payment_details: String,
    session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderLine>) -> Result<Order, sqlx::Error> {
        let status = self.status.parse::<OrderStatusType>().map_err(decode_err)?;
        let payment_method = self.payment_method.parse::<PaymentMethod>().map_err(decode_err)?;
        let payment_details = serde_json::from_str::<PaymentDetails>(&self.payment_details).map_err(decode_err)?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items,
            total_amount: self.total_amount,
            status,
            shipping_address: self.shipping_address,
            payment_method,
            payment_details,
            session_id: self.session_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// The result of trying to take every line of an order out of the Inventory Ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockReservation {
    /// Every line was decremented. The lines carry their snapshotted prices.
    Reserved(Vec<OrderLine>),
    /// At least one line could not be satisfied. Every failing line is listed. The caller must roll back.
    Short(Vec<StockShortfall>),
}

/// Folds repeated product ids into one line so that each product is decremented (and stored) once.
fn normalise_lines(lines: &[NewOrderLine]) -> Vec<NewOrderLine> {
    let mut folded = BTreeMap::<i64, NewOrderLine>::new();
    for line in lines {
        folded
            .entry(line.product_id)
            .and_modify(|l| l.quantity += line.quantity)
            .or_insert_with(|| line.clone());
    }
    folded.into_values().collect()
}

/// Runs the conditional stock decrement for every line. Decrements are not undone here on a shortfall; that is the
/// job of the enclosing transaction.
pub async fn reserve_stock(
    lines: &[NewOrderLine],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<StockReservation, sqlx::Error> {
    let mut reserved = Vec::with_capacity(lines.len());
    let mut short = Vec::new();
    for line in normalise_lines(lines) {
        match products::decrement_stock(line.product_id, line.quantity, now, &mut *conn).await? {
            Some(catalog_price) => reserved.push(OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.quoted_price.unwrap_or(catalog_price),
            }),
            None => {
                let available = products::fetch_product(line.product_id, &mut *conn).await?.map(|p| p.stock);
                short.push(StockShortfall { product_id: line.product_id, requested: line.quantity, available });
            },
        }
    }
    if short.is_empty() {
        Ok(StockReservation::Reserved(reserved))
    } else {
        Ok(StockReservation::Short(short))
    }
}

/// The commit step of checkout. Must be called inside a transaction, and the transaction must be rolled back if this
/// returns an error.
pub async fn commit_order(
    order: NewOrder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, CheckoutDatabaseError> {
    if order.lines.is_empty() {
        return Err(CheckoutDatabaseError::EmptyOrder);
    }
    let lines = match reserve_stock(&order.lines, now, &mut *conn).await? {
        StockReservation::Reserved(lines) => lines,
        StockReservation::Short(short) => {
            debug!("🗃️ Order for user #{} is short on {} line(s)", order.user_id, short.len());
            return Err(CheckoutDatabaseError::InsufficientStock(short));
        },
    };
    let total: Money = lines.iter().map(OrderLine::line_total).sum();
    let id = insert_order(&order, total, &lines, now, &mut *conn).await?;
    for line in &lines {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(order.user_id)
            .bind(line.product_id)
            .execute(&mut *conn)
            .await?;
    }
    debug!("🗃️ Order #{id} committed for user #{} with {} lines. Total {total}", order.user_id, lines.len());
    fetch_order(id, &mut *conn)
        .await?
        .ok_or_else(|| CheckoutDatabaseError::DatabaseError(format!("Order #{id} vanished after insert")))
}

async fn insert_order(
    order: &NewOrder,
    total: Money,
    lines: &[OrderLine],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let details = serde_json::to_string(&order.payment_details).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO orders (
                user_id,
                total_amount,
                status,
                shipping_address,
                payment_method,
                payment_details,
                session_id,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING id
        "#,
    )
    .bind(order.user_id)
    .bind(total)
    .bind(OrderStatusType::Placed.to_string())
    .bind(order.shipping_address.as_str())
    .bind(order.payment_method.as_str())
    .bind(details)
    .bind(order.session_id.as_deref())
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    for line in lines {
        sqlx::query("INSERT INTO order_lines (order_id, product_id, quantity, price_at_purchase) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.price_at_purchase)
            .execute(&mut *conn)
            .await?;
    }
    Ok(id)
}

async fn fetch_lines(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderLine>, sqlx::Error> {
    sqlx::query_as(
        "SELECT product_id, quantity, price_at_purchase FROM order_lines WHERE order_id = $1 ORDER BY product_id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

async fn hydrate(row: OrderRow, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let lines = fetch_lines(row.id, conn).await?;
    row.into_order(lines)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let row: Option<OrderRow> = sqlx::query_as(&sql).bind(order_id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

pub async fn fetch_order_by_session_id(
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE session_id = $1");
    let row: Option<OrderRow> = sqlx::query_as(&sql).bind(session_id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

/// The user's orders, newest first.
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC");
    let rows: Vec<OrderRow> = sqlx::query_as(&sql).bind(user_id).fetch_all(&mut *conn).await?;
    trace!("🗃️ User #{user_id} has {} orders", rows.len());
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(row, &mut *conn).await?);
    }
    Ok(orders)
}

/// Sets the order status, but only if it is still `from`. Returns false if the status had changed in the meantime.
pub async fn update_order_status(
    order_id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4")
        .bind(to.to_string())
        .bind(now)
        .bind(order_id)
        .bind(from.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
