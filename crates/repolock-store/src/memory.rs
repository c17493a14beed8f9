//! In-memory [`TransactionalStore`] with optimistic concurrency.
//!
//! Entries carry a version that changes on every committed write. A
//! transaction records the version of each key it read and validates the
//! whole read set under a commit gate, so of N transactions racing on the
//! same key the first committer wins and the rest fail with a conflict.
//!
//! Used by the test suites and as a reference implementation of the
//! contract; production deployments plug in a remote store instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use repolock_common::{StoreError, StoreResult};

use crate::traits::{Transaction, TransactionalStore};

#[derive(Clone)]
struct VersionedValue {
    value: Vec<u8>,
    version: u64,
}

/// Store innards, shared with every open transaction.
#[derive(Clone, Default)]
struct Shared {
    entries: Arc<DashMap<String, VersionedValue>>,
    // Serializes commit validation; individual reads stay lock-free.
    commit_gate: Arc<Mutex<()>>,
    next_version: Arc<AtomicU64>,
    failing_commits: Arc<AtomicU32>,
}

/// In-process transactional store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Shared,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with a transient error.
    ///
    /// Lets tests exercise the retry path without a flaky backend.
    pub fn fail_next_commits(&self, n: u32) {
        self.shared.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Number of live entries, committed transactions only.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }
}

enum StagedOp {
    Put(String, Vec<u8>),
    Delete(String),
}

/// One open transaction against a [`MemoryStore`].
pub struct MemoryTransaction {
    shared: Shared,
    // Version observed for each key read, 0 meaning absent.
    reads: HashMap<String, u64>,
    staged: Vec<StagedOp>,
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            reads: HashMap::new(),
            staged: Vec::new(),
        }))
    }

    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.shared.entries.get(key).map(|entry| entry.value.clone()))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        // Reads observe this transaction's own staged writes first.
        for op in self.staged.iter().rev() {
            match op {
                StagedOp::Put(staged_key, value) if staged_key == key => {
                    return Ok(Some(value.clone()));
                }
                StagedOp::Delete(staged_key) if staged_key == key => return Ok(None),
                _ => {}
            }
        }
        let current = self.shared.entries.get(key);
        let version = current.as_ref().map(|entry| entry.version).unwrap_or(0);
        self.reads.entry(key.to_string()).or_insert(version);
        Ok(current.map(|entry| entry.value.clone()))
    }

    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.staged.push(StagedOp::Put(key.to_string(), value));
    }

    fn delete(&mut self, key: &str) {
        self.staged.push(StagedOp::Delete(key.to_string()));
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;

        loop {
            let remaining = this.shared.failing_commits.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            if this
                .shared
                .failing_commits
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(StoreError::Unavailable(
                    "injected commit failure".to_string(),
                ));
            }
        }

        let _gate = this.shared.commit_gate.lock().await;

        // First committer wins: every key read must be unchanged.
        for (key, observed) in &this.reads {
            let current = this
                .shared
                .entries
                .get(key)
                .map(|entry| entry.version)
                .unwrap_or(0);
            if current != *observed {
                return Err(StoreError::Conflict(key.clone()));
            }
        }

        for op in this.staged {
            match op {
                StagedOp::Put(key, value) => {
                    let version = this.shared.next_version.fetch_add(1, Ordering::SeqCst) + 1;
                    this.shared
                        .entries
                        .insert(key, VersionedValue { value, version });
                }
                StagedOp::Delete(key) => {
                    this.shared.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        // Nothing was applied; dropping the staged ops is enough.
        Ok(())
    }
}
