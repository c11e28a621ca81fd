use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::decode_err;
use crate::db_types::{Money, NewPaymentSession, PaymentMethod, PaymentSession, PaymentSessionStatus, QuotedLine};

const SESSION_COLUMNS: &str = "session_id, provider, user_id, payment_method, shipping_address, amount, items, status, \
                               order_id, failure_reason, created_at, updated_at";

#[derive(Debug, FromRow)]
struct SessionRow {
    session_id: String,
    provider: String,
    user_id: i64,
    payment_method: String,
    shipping_address: String,
    amount: Money,
    items: String,
    status: String,
    order_id: Option<i64>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for PaymentSession {
    type Error = sqlx::Error;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let items = serde_json::from_str::<Vec<QuotedLine>>(&row.items).map_err(decode_err)?;
        Ok(Self {
            session_id: row.session_id,
            provider: row.provider,
            user_id: row.user_id,
            payment_method: row.payment_method.parse::<PaymentMethod>().map_err(decode_err)?,
            shipping_address: row.shipping_address,
            amount: row.amount,
            items,
            status: row.status.parse::<PaymentSessionStatus>().map_err(decode_err)?,
            order_id: row.order_id,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_session(
    session: NewPaymentSession,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentSession, sqlx::Error> {
    let items = serde_json::to_string(&session.items).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    let sql = format!(
        "INSERT INTO payment_sessions (session_id, provider, user_id, payment_method, shipping_address, amount, items, \
         status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) RETURNING {SESSION_COLUMNS}"
    );
    let row: SessionRow = sqlx::query_as(&sql)
        .bind(session.session_id)
        .bind(session.provider)
        .bind(session.user_id)
        .bind(session.payment_method.as_str())
        .bind(session.shipping_address)
        .bind(session.amount)
        .bind(items)
        .bind(PaymentSessionStatus::Pending.to_string())
        .bind(now)
        .fetch_one(conn)
        .await?;
    row.try_into()
}

pub async fn fetch_session(
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentSession>, sqlx::Error> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM payment_sessions WHERE session_id = $1");
    let row: Option<SessionRow> = sqlx::query_as(&sql).bind(session_id).fetch_optional(conn).await?;
    row.map(PaymentSession::try_from).transpose()
}

/// The compare-and-set at the heart of webhook idempotence: only one caller can ever move a session out of `Pending`.
pub async fn claim_session(
    session_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    transition(session_id, PaymentSessionStatus::Completed, None, now, conn).await
}

pub async fn link_order(
    session_id: &str,
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_sessions SET order_id = $1, updated_at = $2 WHERE session_id = $3")
        .bind(order_id)
        .bind(now)
        .bind(session_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Moves a `Pending` session to `status`. Returns false if the session was not pending (or does not exist).
pub async fn transition(
    session_id: &str,
    status: PaymentSessionStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE payment_sessions SET status = $1, failure_reason = $2, updated_at = $3
            WHERE session_id = $4 AND status = $5
        "#,
    )
    .bind(status.to_string())
    .bind(reason)
    .bind(now)
    .bind(session_id)
    .bind(PaymentSessionStatus::Pending.to_string())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Marks every session that has been pending since before `created_before` as expired.
pub async fn expire_sessions(
    created_before: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
            UPDATE payment_sessions SET status = $1, failure_reason = 'Payment was not confirmed in time', updated_at = $2
            WHERE status = $3 AND created_at < $4
            RETURNING session_id
        "#,
    )
    .bind(PaymentSessionStatus::Expired.to_string())
    .bind(now)
    .bind(PaymentSessionStatus::Pending.to_string())
    .bind(created_before)
    .fetch_all(conn)
    .await
}
