//! One-time password issuance and validation.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sf_common::Secret;

use crate::{
    db_types::{ConsumeChallengeResult, NewOtpChallenge, OtpPurpose},
    events::{EventProducers, OtpIssuedEvent},
    helpers::{generate_otp_code, hash_otp_code, is_well_formed},
    sf_api::errors::OtpError,
    traits::OtpManagement,
};

#[derive(Debug, Clone)]
pub struct OtpSettings {
    /// How long a code stays valid after it is issued.
    pub ttl: Duration,
    /// Failed attempts after which a challenge is burned.
    pub max_attempts: i64,
    /// Server secret mixed into code hashes.
    pub pepper: Secret<String>,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self { ttl: Duration::seconds(300), max_attempts: 5, pepper: Secret::default() }
    }
}

pub struct OtpApi<B> {
    db: B,
    settings: OtpSettings,
    producers: EventProducers,
}

impl<B: Debug> Debug for OtpApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OtpApi ({:?}, ttl: {}s)", self.db, self.settings.ttl.num_seconds())
    }
}

impl<B> OtpApi<B>
where B: OtpManagement
{
    pub fn new(db: B, settings: OtpSettings, producers: EventProducers) -> Self {
        Self { db, settings, producers }
    }

    pub fn settings(&self) -> &OtpSettings {
        &self.settings
    }

    /// Issues a new code for the user and purpose, replacing any code issued earlier. Returns the expiry time.
    ///
    /// The code is handed to the `OtpIssued` hook for delivery. Delivery is fire-and-forget; a failure there does not
    /// undo the issuance, and the user can simply ask for a new code.
    pub async fn issue(&self, user_id: i64, purpose: OtpPurpose) -> Result<DateTime<Utc>, OtpError> {
        let code = generate_otp_code();
        let expires_at = Utc::now() + self.settings.ttl;
        let challenge = NewOtpChallenge {
            user_id,
            purpose,
            code_hash: hash_otp_code(&code, self.settings.pepper.reveal().as_bytes()),
            expires_at,
        };
        self.db.insert_challenge(challenge).await?;
        info!("🔐️ Issued a {purpose} OTP for user #{user_id}. It expires at {expires_at}");
        self.call_otp_issued_hook(OtpIssuedEvent { user_id, purpose, code, expires_at }).await;
        Ok(expires_at)
    }

    /// Checks the code against the live challenge and consumes it. A code is good for exactly one successful call.
    pub async fn validate(&self, user_id: i64, purpose: OtpPurpose, code: &str) -> Result<(), OtpError> {
        if !is_well_formed(code) {
            debug!("🔐️ Malformed OTP submitted by user #{user_id}");
            return Err(OtpError::OtpInvalid);
        }
        let hash = hash_otp_code(code, self.settings.pepper.reveal().as_bytes());
        let result =
            self.db.consume_challenge(user_id, purpose, &hash, self.settings.max_attempts, Utc::now()).await?;
        match result {
            ConsumeChallengeResult::Consumed => {
                debug!("🔐️ {purpose} OTP for user #{user_id} verified");
                Ok(())
            },
            ConsumeChallengeResult::MatchedButExpired | ConsumeChallengeResult::Expired => {
                debug!("🔐️ {purpose} OTP for user #{user_id} has expired");
                Err(OtpError::OtpExpired)
            },
            ConsumeChallengeResult::Mismatch { burned } => {
                if burned {
                    warn!("🔐️ Too many failed {purpose} OTP attempts for user #{user_id}. The challenge is burned.");
                } else {
                    debug!("🔐️ Wrong {purpose} OTP for user #{user_id}");
                }
                Err(OtpError::OtpInvalid)
            },
            ConsumeChallengeResult::NoChallenge => {
                debug!("🔐️ User #{user_id} has no live {purpose} OTP");
                Err(OtpError::OtpInvalid)
            },
        }
    }

    /// Removes consumed and expired challenges.
    pub async fn purge(&self) -> Result<u64, OtpError> {
        let purged = self.db.purge_otp_challenges(Utc::now()).await?;
        Ok(purged)
    }

    async fn call_otp_issued_hook(&self, event: OtpIssuedEvent) {
        if self.producers.otp_issued_producer.is_empty() {
            warn!("🔐️ No OTP delivery hook is registered. User #{} will never receive their code.", event.user_id);
        }
        for emitter in &self.producers.otp_issued_producer {
            debug!("🔐️ Notifying OTP issued hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }
}
