//! Persisted lock record and key derivation.

use std::time::Duration;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use repolock_common::current_timestamp;

/// How long a held lock stays valid when the holder never releases it.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(20);

/// Hard cap on the lock duration a handle may request.
pub const MAX_LOCK_DURATION: Duration = Duration::from_secs(60);

/// How long `acquire` keeps retrying before giving up.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(120);

/// The persisted unit of truth for one lock.
///
/// At most one valid (non-expired) record exists per key; the store's
/// transaction isolation is what enforces that, never in-process
/// synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    /// Opaque token proving which handle created the record.
    pub owner_id: String,
    /// Unix millis after which the record is logically absent.
    pub expires_at: i64,
}

impl LockRecord {
    pub fn new(owner_id: impl Into<String>, lock_duration: Duration) -> Self {
        Self {
            owner_id: owner_id.into(),
            expires_at: current_timestamp() + lock_duration.as_millis() as i64,
        }
    }

    /// An expired record may be overwritten by any acquirer.
    pub fn is_expired(&self) -> bool {
        current_timestamp() > self.expires_at
    }

    /// Decode a stored value. An undecodable value cannot represent a
    /// valid holder, so callers treat `None` as absent.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Store key for a `(namespace, target)` pair.
///
/// The target is an arbitrary string (usually a repository URL), so it is
/// hashed into a fixed-length hex segment to bound key length and avoid
/// characters the backing store may reject.
pub fn lock_key(namespace: &str, target: &str) -> String {
    format!(
        "lock-{}::{}",
        namespace,
        const_hex::encode(Md5::digest(target.as_bytes()))
    )
}
