use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::CartItem;

pub async fn fetch_cart(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, sqlx::Error> {
    sqlx::query_as(
        "SELECT product_id, quantity, last_modified_at FROM cart_items WHERE user_id = $1 ORDER BY product_id",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

/// Deletes the user's cart and writes `items` in its place. Not atomic on its own; run it inside a transaction.
pub async fn replace_cart(user_id: i64, items: &[CartItem], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(&mut *conn).await?;
    for item in items {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity, last_modified_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.last_modified_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Records that the guest snapshot identified by `sync_id` is being merged. Returns false if it was seen before.
pub async fn record_sync(
    sync_id: &str,
    user_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO cart_syncs (sync_id, user_id, created_at) VALUES ($1, $2, $3) ON CONFLICT (sync_id) DO NOTHING",
    )
    .bind(sync_id)
    .bind(user_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn upsert_item(
    user_id: i64,
    product_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<CartItem, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO cart_items (user_id, product_id, quantity, last_modified_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO UPDATE
                SET quantity = excluded.quantity, last_modified_at = excluded.last_modified_at
            RETURNING product_id, quantity, last_modified_at
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn remove_item(user_id: i64, product_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
