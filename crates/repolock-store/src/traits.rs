use async_trait::async_trait;

use repolock_common::StoreResult;

/// Atomic read-modify-write transactions over an opaque key-value store.
///
/// Implementations wrap a remote store (or an in-process one for tests).
/// `commit` must fail with [`StoreError::Conflict`] when another
/// transaction touching the same keys committed first; that guarantee is
/// what keeps two processes from both writing a lock record.
///
/// The client instance is constructed by whoever boots the process and
/// injected into lock handles; there is no implicit global client.
///
/// [`StoreError::Conflict`]: repolock_common::StoreError::Conflict
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>>;

    /// Non-transactional point read, for status queries only.
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
}

/// A single atomic transaction.
///
/// `commit` and `rollback` consume the transaction. A failed `commit`
/// leaves nothing applied, and dropping a transaction without committing
/// is equivalent to a rollback.
#[async_trait]
pub trait Transaction: Send {
    /// Read a value within the transaction's isolation snapshot.
    /// Staged writes from this transaction are visible.
    async fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stage a write, applied atomically on `commit`.
    fn put(&mut self, key: &str, value: Vec<u8>);

    /// Stage a deletion, applied atomically on `commit`.
    fn delete(&mut self, key: &str);

    /// Atomically apply all staged operations.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Abandon the transaction. Always safe to call.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
