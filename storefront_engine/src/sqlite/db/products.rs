use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{Money, NewProduct, Product};

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT id, name, price, stock, updated_at FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as("SELECT id, name, price, stock, updated_at FROM products ORDER BY id").fetch_all(conn).await
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO products (name, price, stock, updated_at) VALUES ($1, $2, $3, $4)
            RETURNING id, name, price, stock, updated_at
        "#,
    )
    .bind(product.name)
    .bind(product.price)
    .bind(product.stock)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

/// Current stock for each of the given products. Unknown products are absent from the map.
pub async fn stock_levels(
    product_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<HashMap<i64, i64>, sqlx::Error> {
    let mut result = HashMap::with_capacity(product_ids.len());
    for id in product_ids {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
        if let Some(stock) = stock {
            result.insert(*id, stock);
        }
    }
    Ok(result)
}

/// Takes `quantity` units of a product out of the Inventory Ledger, but only if that many are in stock.
///
/// Returns the catalog price at the moment of the decrement, or `None` if the product is unknown or short. This is
/// the only statement that ever lowers stock.
pub async fn decrement_stock(
    product_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Money>, sqlx::Error> {
    let price = sqlx::query_scalar(
        r#"
            UPDATE products SET stock = stock - $1, updated_at = $2
            WHERE id = $3 AND stock >= $1
            RETURNING price
        "#,
    )
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Stock decrement of {quantity} for product {product_id}: {}", price.is_some());
    Ok(price)
}
