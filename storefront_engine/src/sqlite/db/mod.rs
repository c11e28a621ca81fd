//! # SQLite Database methods
//!
//! This module contains the "low-level" SQLite database interactions.
//!
//! Every interaction is a plain function that takes a `&mut SqliteConnection`. Callers can pass a pooled connection
//! for a one-off query, or open a transaction and pass `&mut tx` to compose several calls atomically.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod carts;
pub mod orders;
pub mod otp;
pub mod payment_sessions;
pub mod products;

const SQLITE_DB_URL: &str = "sqlite://data/storefront.db";
/// How long a writer waits for the database lock before giving up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("SF_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ SF_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Maps a text column that failed to parse into the error sqlx uses for undecodable values.
pub(crate) fn decode_err<E>(e: E) -> SqlxError
where E: std::error::Error + Send + Sync + 'static {
    SqlxError::Decode(Box::new(e))
}
