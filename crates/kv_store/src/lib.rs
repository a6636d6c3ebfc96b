//! # KV Store
//!
//! Key-value store backends implementing `contracts::KvStore`.
//!
//! Responsibilities:
//! - Linearizable counters for offset allocation and daily intake
//! - String values and sets for metadata, datapoints, cursors and consumer sets
//! - JSON snapshots so cursors and logs survive restarts
//! - Redis backend for deployments sharing one store
//! - Fault injection for failure-path tests
//!
//! ## Usage Example
//!
//! ```ignore
//! use contracts::KvStore;
//! use kv_store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! assert_eq!(store.incr_by("pipeline:p1:datapoints", 1).await?, 1);
//! ```

mod memory;
mod redis_store;
mod snapshot;

pub use contracts::{KvStore, StoreError};
pub use memory::{FaultConfig, MemoryStore};
pub use redis_store::RedisStore;
