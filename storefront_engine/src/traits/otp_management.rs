use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{ConsumeChallengeResult, NewOtpChallenge, OtpChallenge, OtpPurpose};

#[derive(Debug, Clone, Error)]
pub enum OtpStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for OtpStoreError {
    fn from(e: sqlx::Error) -> Self {
        OtpStoreError::DatabaseError(e.to_string())
    }
}

/// Storage for one-time password challenges. Only hashes of codes are ever stored.
#[allow(async_fn_in_trait)]
pub trait OtpManagement {
    /// Stores a new challenge, discarding any unconsumed challenge for the same user and purpose in the same
    /// transaction. There is never more than one live challenge per `(user, purpose)`.
    async fn insert_challenge(&self, challenge: NewOtpChallenge) -> Result<OtpChallenge, OtpStoreError>;

    /// Compares `code_hash` against the live challenge and consumes it on a match.
    ///
    /// The match and the consumption happen in the same statement, so a code can be redeemed at most once even under
    /// concurrent requests. A mismatch counts as a failed attempt, and the challenge is burned once `max_attempts`
    /// failures have been recorded.
    async fn consume_challenge(
        &self,
        user_id: i64,
        purpose: OtpPurpose,
        code_hash: &str,
        max_attempts: i64,
        now: DateTime<Utc>,
    ) -> Result<ConsumeChallengeResult, OtpStoreError>;

    /// Deletes consumed challenges and those that expired before `now`. Returns the number of rows removed.
    async fn purge_otp_challenges(&self, now: DateTime<Utc>) -> Result<u64, OtpStoreError>;
}
