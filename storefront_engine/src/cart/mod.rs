mod merge;
mod sync_session;

pub use merge::{clamp_to_stock, merge, CartSnapshot, MergePolicy, MergeWarning, MergeWarningKind, MergedCart};
pub use sync_session::{CartSyncSession, SyncRequest, SyncSessionError, SyncState};
