use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{NewOtpChallenge, OtpChallenge, OtpPurpose};

const CHALLENGE_COLUMNS: &str = "id, user_id, purpose, code_hash, attempts, expires_at, consumed_at, created_at";

/// Removes every unconsumed challenge for the user and purpose. Returns the number of challenges discarded.
pub async fn discard_live_challenges(
    user_id: i64,
    purpose: OtpPurpose,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM otp_challenges WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL")
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn insert_challenge(
    challenge: NewOtpChallenge,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OtpChallenge, sqlx::Error> {
    let sql = format!(
        "INSERT INTO otp_challenges (user_id, purpose, code_hash, expires_at, created_at) VALUES ($1, $2, $3, $4, $5) \
         RETURNING {CHALLENGE_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(challenge.user_id)
        .bind(challenge.purpose.as_str())
        .bind(challenge.code_hash)
        .bind(challenge.expires_at)
        .bind(now)
        .fetch_one(conn)
        .await
}

/// Consumes the live challenge if (and only if) its hash matches. Returns the expiry time of the consumed challenge.
pub async fn consume_matching(
    user_id: i64,
    purpose: OtpPurpose,
    code_hash: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
            UPDATE otp_challenges SET consumed_at = $1
            WHERE user_id = $2 AND purpose = $3 AND code_hash = $4 AND consumed_at IS NULL
            RETURNING expires_at
        "#,
    )
    .bind(now)
    .bind(user_id)
    .bind(purpose.as_str())
    .bind(code_hash)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_live_challenge(
    user_id: i64,
    purpose: OtpPurpose,
    conn: &mut SqliteConnection,
) -> Result<Option<OtpChallenge>, sqlx::Error> {
    let sql = format!(
        "SELECT {CHALLENGE_COLUMNS} FROM otp_challenges WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL \
         ORDER BY id DESC LIMIT 1"
    );
    sqlx::query_as(&sql).bind(user_id).bind(purpose.as_str()).fetch_optional(conn).await
}

/// Counts a failed attempt against a challenge, burning it once `max_attempts` is reached. Returns the new count.
pub async fn record_failed_attempt(
    challenge_id: i64,
    max_attempts: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
            UPDATE otp_challenges
            SET attempts = attempts + 1,
                consumed_at = CASE WHEN attempts + 1 >= $1 THEN $2 ELSE NULL END
            WHERE id = $3
            RETURNING attempts
        "#,
    )
    .bind(max_attempts)
    .bind(now)
    .bind(challenge_id)
    .fetch_one(conn)
    .await
}

pub async fn purge(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM otp_challenges WHERE consumed_at IS NOT NULL OR expires_at <= $1")
        .bind(now)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
