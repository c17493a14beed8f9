//! Transactional key-value store contract consumed by the lock.
//!
//! The lock never mutates store state outside a transaction; the store's
//! isolation between concurrent transactions is the sole mechanism that
//! makes mutual exclusion hold across processes.

pub mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::{Transaction, TransactionalStore};
