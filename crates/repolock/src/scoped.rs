//! Scoped locking: acquire, run work, always release.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use repolock_common::LockError;
use repolock_store::TransactionalStore;

use crate::handle::{LockHandle, LockOptions};

/// Run `work` while holding the lock for `(namespace, target)`.
///
/// Raises [`LockError::AcquireTimeout`] when the lock cannot be acquired
/// in time; callers depend on mutual exclusion for correctness, so
/// proceeding silently is not an option. The hosting job infrastructure
/// is expected to redeliver the unit of work later.
///
/// `release` is attempted whether `work` succeeded or failed, and
/// `work`'s outcome takes precedence: a release failure after a failed
/// `work` is logged, never raised in its place. An ownership violation on
/// release after a successful `work` does surface, since it means the
/// critical section may have overlapped with another holder's.
pub async fn with_lock<R, F, Fut>(
    store: Arc<dyn TransactionalStore>,
    namespace: &str,
    target: &str,
    options: LockOptions,
    work: F,
) -> anyhow::Result<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    let lock = LockHandle::new(store, namespace, target, options)?;
    if !lock.acquire().await {
        return Err(LockError::AcquireTimeout {
            target: target.to_string(),
            timeout: options.acquire_timeout,
        }
        .into());
    }

    let result = work().await;

    match lock.release().await {
        Ok(released) => {
            if !released {
                warn!(
                    "could not release the lock for {}, it will expire on its own",
                    target
                );
            }
        }
        Err(err) => {
            if result.is_ok() {
                return Err(err.into());
            }
            warn!(
                "release failed after the locked work errored for {}: {}",
                target, err
            );
        }
    }
    result
}

/// Factory over an injected store client.
///
/// One client is constructed by whichever process boots the service and
/// handed to everything that needs locking; handles created from the same
/// client share the connection but nothing else.
#[derive(Clone)]
pub struct LockClient {
    store: Arc<dyn TransactionalStore>,
}

impl LockClient {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    /// Build a [`LockHandle`] for `(namespace, target)`.
    pub fn handle(
        &self,
        namespace: &str,
        target: &str,
        options: LockOptions,
    ) -> Result<LockHandle, LockError> {
        LockHandle::new(self.store.clone(), namespace, target, options)
    }

    /// [`with_lock`] over this client's store.
    pub async fn with_lock<R, F, Fut>(
        &self,
        namespace: &str,
        target: &str,
        options: LockOptions,
        work: F,
    ) -> anyhow::Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        with_lock(self.store.clone(), namespace, target, options, work).await
    }
}
