//! KvStore trait - storage adapter interface
//!
//! The log engine only talks to storage through this trait. A backend must make
//! `incr_by` linearizable per key: concurrent increments never return the same value
//! twice and never skip one. Everything else may be eventually visible.

use bytes::Bytes;

use crate::StoreError;

/// Key-value store with atomic counters and sets
///
/// Counters share the string keyspace: `incr_by` parses the stored value as a decimal
/// integer, an absent key reads as 0. Backends do not retry failed operations.
#[trait_variant::make(KvStore: Send)]
pub trait LocalKvStore {
    /// Read a value; `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    /// Write a value only if the key is absent
    ///
    /// # Returns
    /// `true` if the value was written
    async fn set_if_absent(&self, key: &str, value: Bytes) -> Result<bool, StoreError>;

    /// Remove a key of any type
    ///
    /// # Returns
    /// `true` if the key existed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically add `delta` to a counter and return the new value
    ///
    /// `incr_by(key, 0)` is the canonical counter read.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// All keys starting with `prefix`
    async fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Add a member to a set
    ///
    /// # Returns
    /// `true` if the member was not present before
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Members of a set; empty when the key is absent
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Connectivity check, used when a worker opens its connection
    async fn ping(&self) -> Result<(), StoreError>;
}
