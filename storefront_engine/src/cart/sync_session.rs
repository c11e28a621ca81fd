//! Client-side ownership of the guest cart during sign-in.
//!
//! A [`CartSyncSession`] holds the anonymous cart snapshot until the server confirms that it has been merged into the
//! account cart. It is a small state machine:
//!
//! ```text
//!   Unsynced ──begin──▶ Syncing ──complete──▶ Synced
//!                        │   ▲
//!                   fail │   │ begin (retry)
//!                        ▼   │
//!                        Failed
//! ```
//!
//! The snapshot is dropped only on `complete`, so a failed request never loses the guest cart. Only one request can
//! be in flight, and every attempt carries the same sync id, which lets the server recognise a retry of a request
//! that actually succeeded.
use std::{fmt::Display, future::Future};

use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cart::{CartSnapshot, MergedCart},
    db_types::CartItem,
    helpers::random_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsynced,
    Syncing,
    Synced,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncSessionError {
    #[error("A cart sync request is already in flight")]
    AlreadyInFlight,
    #[error("The guest cart has already been merged")]
    AlreadySynced,
    #[error("No cart sync request is in flight")]
    NotSyncing,
    #[error("Cart sync failed: {0}")]
    RequestFailed(String),
}

/// The body a client posts to the cart sync endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub sync_id: Option<String>,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone)]
pub struct CartSyncSession {
    sync_id: String,
    state: SyncState,
    snapshot: Option<CartSnapshot>,
    last_error: Option<String>,
}

impl CartSyncSession {
    pub fn new(snapshot: CartSnapshot) -> Self {
        Self { sync_id: random_id("sync"), state: SyncState::Unsynced, snapshot: Some(snapshot), last_error: None }
    }

    pub fn sync_id(&self) -> &str {
        &self.sync_id
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The guest cart that still has to be merged, if any.
    pub fn pending_snapshot(&self) -> Option<&CartSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn begin_sync(&mut self) -> Result<SyncRequest, SyncSessionError> {
        match self.state {
            SyncState::Syncing => Err(SyncSessionError::AlreadyInFlight),
            SyncState::Synced => Err(SyncSessionError::AlreadySynced),
            SyncState::Unsynced | SyncState::Failed => {
                let items = self.snapshot.as_ref().map(|s| s.items().cloned().collect()).unwrap_or_default();
                self.state = SyncState::Syncing;
                self.last_error = None;
                Ok(SyncRequest { sync_id: Some(self.sync_id.clone()), items })
            },
        }
    }

    pub fn complete(&mut self) -> Result<(), SyncSessionError> {
        if self.state != SyncState::Syncing {
            return Err(SyncSessionError::NotSyncing);
        }
        self.state = SyncState::Synced;
        self.snapshot = None;
        Ok(())
    }

    pub fn fail<S: Into<String>>(&mut self, reason: S) -> Result<(), SyncSessionError> {
        if self.state != SyncState::Syncing {
            return Err(SyncSessionError::NotSyncing);
        }
        self.state = SyncState::Failed;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Runs one sync attempt with `send` as the transport.
    pub async fn sync_with<F, Fut, E>(&mut self, send: F) -> Result<MergedCart, SyncSessionError>
    where
        F: FnOnce(SyncRequest) -> Fut,
        Fut: Future<Output = Result<MergedCart, E>>,
        E: Display,
    {
        let request = self.begin_sync()?;
        debug!("🛒️ Syncing {} guest cart lines with id {}", request.items.len(), self.sync_id);
        match send(request).await {
            Ok(merged) => {
                self.complete()?;
                Ok(merged)
            },
            Err(e) => {
                let reason = e.to_string();
                warn!("🛒️ Guest cart sync {} failed. The snapshot is kept for a retry. {reason}", self.sync_id);
                self.fail(reason.clone())?;
                Err(SyncSessionError::RequestFailed(reason))
            },
        }
    }
}
