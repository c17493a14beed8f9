//! Distributed mutual-exclusion locks over a transactional key-value store.
//!
//! Serializes work that multiple stateless process instances might
//! otherwise perform concurrently on the same logical resource, for
//! example "don't let two instances sync labels for the same repository
//! at once". Correctness rests on two things only: the store's atomic
//! transactions, and time-based expiry for holders that crashed.
//!
//! - [`LockHandle`] owns a unique owner id and drives the acquire retry
//!   loop against an injected [`TransactionalStore`].
//! - [`with_lock`] / [`LockClient`] wrap a unit of work in acquire /
//!   guaranteed-release.
//! - [`MemoryStore`] is an in-process store for tests.
//!
//! This crate provides no fairness between waiters, no fencing tokens
//! beyond the single owner id and no multi-key transactions.

pub mod backoff;
pub mod handle;
pub mod model;
pub mod scoped;

// Re-export the lock surface
pub use backoff::BackoffScheduler;
pub use handle::{LockHandle, LockOptions};
pub use model::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_LOCK_DURATION, LockRecord, MAX_LOCK_DURATION, lock_key,
};
pub use scoped::{LockClient, with_lock};

// Re-export the error taxonomy and the store contract
pub use repolock_common::{LockError, StoreError};
pub use repolock_store::{MemoryStore, Transaction, TransactionalStore};
