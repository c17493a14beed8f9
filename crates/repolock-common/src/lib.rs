//! Shared building blocks for the repolock workspace.

pub mod error;
pub mod time;

pub use error::{LockError, StoreError, StoreResult};
pub use time::current_timestamp;
