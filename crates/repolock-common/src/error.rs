//! Error types for the lock and its backing store.
//!
//! The split matters for the retry loop: `StoreError` values are transient
//! infrastructure failures that `acquire` recovers from internally, while
//! `LockError` values are surfaced to callers.

use std::time::Duration;

/// Failures reported by a `TransactionalStore` implementation.
///
/// From the acquisition loop's perspective every variant is retryable;
/// the distinction exists for logging and for store-level tests.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A conflicting transaction committed first.
    #[error("transaction conflict on '{0}'")]
    Conflict(String),

    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by lock handles and the scoped helper.
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    /// Invalid construction parameters. Fatal, never retried.
    #[error("lock duration is too long, max is {max:?}, given {requested:?}")]
    Configuration { requested: Duration, max: Duration },

    /// The acquire timeout elapsed without winning the lock.
    #[error("failed to acquire the lock for '{target}' within {timeout:?}")]
    AcquireTimeout { target: String, timeout: Duration },

    /// The stored record belongs to another holder. Raised by `release`
    /// when the lock expired and was reclaimed while this handle still
    /// believed it held it; must not be swallowed.
    #[error("the lock for '{target}' was acquired by another process")]
    Ownership { target: String },

    /// A store failure in a context where it cannot be retried away.
    #[error(transparent)]
    Store(#[from] StoreError),
}
