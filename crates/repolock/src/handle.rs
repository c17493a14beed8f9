//! The lock handle: acquire / release / peek against the injected store.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use repolock_common::LockError;
use repolock_store::TransactionalStore;

use crate::backoff::BackoffScheduler;
use crate::model::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_LOCK_DURATION, LockRecord, MAX_LOCK_DURATION, lock_key,
};

/// Outcome of a single acquisition attempt. Held and Failed both fall
/// through to the same backoff-and-retry path; they are distinguished
/// for logging only.
enum Attempt {
    Acquired,
    Held,
    Failed,
}

/// Tunables for one lock handle.
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// How long a held lock stays valid before auto-expiry. If this
    /// process crashes without releasing, the lock frees itself after
    /// this duration. Capped at [`MAX_LOCK_DURATION`].
    pub lock_duration: Duration,
    /// How long `acquire` keeps retrying before returning `false`.
    pub acquire_timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lock_duration: DEFAULT_LOCK_DURATION,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// A lock over one `(namespace, target)` pair.
///
/// Each handle owns a fresh random owner id; the stored record's owner id
/// is what proves which handle may delete it. Competing handles usually
/// live in different processes, so all coordination goes through the
/// store's transactions.
pub struct LockHandle {
    store: Arc<dyn TransactionalStore>,
    target: String,
    key: String,
    owner_id: String,
    lock_duration: Duration,
    acquire_timeout: Duration,
}

impl LockHandle {
    /// Build a handle for `(namespace, target)`.
    ///
    /// Fails fast with [`LockError::Configuration`] when the requested
    /// lock duration exceeds [`MAX_LOCK_DURATION`], without contacting
    /// the store.
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        namespace: &str,
        target: &str,
        options: LockOptions,
    ) -> Result<Self, LockError> {
        if options.lock_duration > MAX_LOCK_DURATION {
            return Err(LockError::Configuration {
                requested: options.lock_duration,
                max: MAX_LOCK_DURATION,
            });
        }
        Ok(Self {
            store,
            target: target.to_string(),
            key: lock_key(namespace, target),
            owner_id: Uuid::new_v4().to_string(),
            lock_duration: options.lock_duration,
            acquire_timeout: options.acquire_timeout,
        })
    }

    /// The opaque token this handle writes into its lock records.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Acquire the lock, retrying with backoff until the acquire timeout
    /// elapses. Returns `false` on timeout; callers must check.
    ///
    /// Transient store failures are recovered here and never surfaced.
    /// The deadline is checked between attempts only, so one in-flight
    /// attempt may complete slightly past it.
    pub async fn acquire(&self) -> bool {
        let start = Instant::now();
        let mut backoff = BackoffScheduler::new();

        while start.elapsed() < self.acquire_timeout {
            let wait = backoff.next_delay();
            match self.try_acquire().await {
                Attempt::Acquired => return true,
                Attempt::Held => {
                    debug!(
                        "the lock for {} is active, retrying in {:?}",
                        self.target, wait
                    );
                }
                Attempt::Failed => {
                    debug!(
                        "failed to acquire the lock for {}, retrying in {:?}",
                        self.target, wait
                    );
                }
            }
            tokio::time::sleep(wait).await;
        }
        false
    }

    /// One atomic attempt: read the record, and write our own if it is
    /// absent or expired.
    async fn try_acquire(&self) -> Attempt {
        let mut txn = match self.store.begin().await {
            Ok(txn) => txn,
            Err(err) => {
                debug!(
                    "could not open a transaction for the lock for {}: {}",
                    self.target, err
                );
                return Attempt::Failed;
            }
        };

        let existing = match txn.get(&self.key).await {
            Ok(raw) => raw.and_then(|raw| LockRecord::decode(&raw)),
            Err(err) => {
                debug!("error reading the lock for {}: {}", self.target, err);
                let _ = txn.rollback().await;
                return Attempt::Failed;
            }
        };

        if let Some(record) = existing
            && !record.is_expired()
        {
            // Someone else holds a valid lock.
            let _ = txn.rollback().await;
            return Attempt::Held;
        }

        let record = LockRecord::new(&self.owner_id, self.lock_duration);
        let raw = match record.encode() {
            Ok(raw) => raw,
            Err(err) => {
                debug!("error encoding the lock for {}: {}", self.target, err);
                let _ = txn.rollback().await;
                return Attempt::Failed;
            }
        };
        txn.put(&self.key, raw);

        match txn.commit().await {
            Ok(()) => Attempt::Acquired,
            Err(err) => {
                // Usually a lost race: a competitor committed first.
                debug!("error committing the lock for {}: {}", self.target, err);
                Attempt::Failed
            }
        }
    }

    /// Release the lock, transactionally, only if this handle still owns
    /// it.
    ///
    /// Releasing an absent lock is a successful no-op. Finding the record
    /// owned by someone else raises [`LockError::Ownership`], because the
    /// lock expired and was stolen while this handle believed it held it.
    /// Transient store failures return `Ok(false)`; the record will
    /// expire on its own.
    pub async fn release(&self) -> Result<bool, LockError> {
        let mut txn = match self.store.begin().await {
            Ok(txn) => txn,
            Err(err) => {
                warn!(
                    "could not open a transaction to release the lock for {}: {}",
                    self.target, err
                );
                return Ok(false);
            }
        };

        let raw = match txn.get(&self.key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "error reading the lock for {} on release: {}",
                    self.target, err
                );
                let _ = txn.rollback().await;
                return Ok(false);
            }
        };

        let Some(raw) = raw else {
            // Already gone: expired and reclaimed, or never held.
            let _ = txn.rollback().await;
            return Ok(true);
        };
        let Some(record) = LockRecord::decode(&raw) else {
            warn!("undecodable lock record for {}", self.target);
            let _ = txn.rollback().await;
            return Ok(false);
        };

        if record.owner_id != self.owner_id {
            let _ = txn.rollback().await;
            return Err(LockError::Ownership {
                target: self.target.clone(),
            });
        }

        txn.delete(&self.key);
        match txn.commit().await {
            Ok(()) => Ok(true),
            Err(err) => {
                warn!("error releasing the lock for {}: {}", self.target, err);
                Ok(false)
            }
        }
    }

    /// Best-effort, read-only check whether a valid lock currently exists
    /// for this key. Never mutates state; store errors read as `false`.
    pub async fn peek(&self) -> bool {
        match self.store.read(&self.key).await {
            Ok(Some(raw)) => LockRecord::decode(&raw).is_some_and(|record| !record.is_expired()),
            Ok(None) => false,
            Err(err) => {
                debug!("error peeking at the lock for {}: {}", self.target, err);
                false
            }
        }
    }
}
