//! In-process store
//!
//! All data lives in one ordered map behind a mutex, so every operation (counters
//! included) is linearizable. No lock is held across an await point.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};

use bytes::Bytes;
use contracts::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::snapshot;

/// Stored value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub(crate) enum Value {
    Bytes(Bytes),
    Set(BTreeSet<String>),
}

/// Fault injection settings
#[derive(Debug, Default, Clone)]
pub struct FaultConfig {
    /// Operations on keys starting with any of these prefixes fail as unavailable
    pub fail_prefixes: Vec<String>,
}

/// Mutex-guarded in-memory `KvStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, Value>>,
    faults: RwLock<FaultConfig>,
    unavailable: AtomicBool,
    fail_next: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with fault injection
    pub fn with_faults(faults: FaultConfig) -> Self {
        Self {
            faults: RwLock::new(faults),
            ..Default::default()
        }
    }

    /// Open a store from a snapshot file; a missing file yields an empty store
    #[instrument(name = "memory_store_open", fields(path = %path.display()))]
    pub fn open(path: &Path) -> io::Result<Self> {
        let entries = snapshot::read(path)?.unwrap_or_default();
        info!(entries = entries.len(), "memory store loaded");
        Ok(Self {
            data: Mutex::new(entries),
            ..Default::default()
        })
    }

    /// Write all data to a snapshot file
    ///
    /// The map is cloned under the lock and serialized outside it.
    ///
    /// # Returns
    /// Number of entries written
    #[instrument(name = "memory_store_save", skip(self), fields(path = %path.display()))]
    pub fn save_snapshot(&self, path: &Path) -> io::Result<usize> {
        let entries = self
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?
            .clone();
        snapshot::write(path, &entries)?;
        debug!(entries = entries.len(), "memory store snapshot written");
        Ok(entries.len())
    }

    /// Make every subsequent operation fail as unavailable (or recover)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Replace the failing key prefixes at runtime
    pub fn set_fail_prefixes(&self, prefixes: Vec<String>) {
        if let Ok(mut faults) = self.faults.write() {
            faults.fail_prefixes = prefixes;
        }
    }

    /// Fail the next `n` operations as unavailable
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.lock().map(|data| data.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Value>>, StoreError> {
        self.data
            .lock()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store marked unavailable"));
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::unavailable("injected failure"));
        }
        let injected = self
            .faults
            .read()
            .map(|faults| faults.fail_prefixes.iter().any(|p| key.starts_with(p)))
            .unwrap_or(false);
        if injected {
            return Err(StoreError::unavailable(format!(
                "injected failure for key '{key}'"
            )));
        }
        Ok(())
    }
}

fn parse_counter(key: &str, raw: &[u8]) -> Result<i64, StoreError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| StoreError::malformed(key, "value is not an integer"))
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.check(key)?;
        match self.lock()?.get(key) {
            None => Ok(None),
            Some(Value::Bytes(value)) => Ok(Some(value.clone())),
            Some(Value::Set(_)) => Err(StoreError::malformed(key, "expected value, found set")),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.check(key)?;
        self.lock()?.insert(key.to_string(), Value::Bytes(value));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Bytes) -> Result<bool, StoreError> {
        self.check(key)?;
        let mut data = self.lock()?;
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), Value::Bytes(value));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check(key)?;
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.check(key)?;
        let mut data = self.lock()?;
        let current = match data.get(key) {
            None => 0,
            Some(Value::Bytes(raw)) => parse_counter(key, raw)?,
            Some(Value::Set(_)) => {
                return Err(StoreError::malformed(key, "expected counter, found set"))
            }
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::malformed(key, "counter overflow"))?;
        if delta != 0 || data.contains_key(key) {
            data.insert(key.to_string(), Value::Bytes(Bytes::from(next.to_string())));
        }
        Ok(next)
    }

    async fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check(prefix)?;
        let data = self.lock()?;
        Ok(data
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check(key)?;
        let mut data = self.lock()?;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()))
        {
            Value::Set(members) => Ok(members.insert(member.to_string())),
            Value::Bytes(_) => Err(StoreError::malformed(key, "expected set, found value")),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check(key)?;
        match self.lock()?.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Value::Bytes(_)) => Err(StoreError::malformed(key, "expected set, found value")),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store marked unavailable"));
        }
        self.lock().map(|_| ())
    }
}
