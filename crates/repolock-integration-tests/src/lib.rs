//! Shared helpers for the lock behavior tests.

use std::sync::Arc;

use repolock::{LockClient, MemoryStore};

/// Fresh in-memory store plus a lock client over it.
pub fn memory_client() -> (Arc<MemoryStore>, LockClient) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), LockClient::new(store))
}
