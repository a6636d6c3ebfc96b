//! Per-pipeline append-only datapoint log
//!
//! The offset counter is the log head: the n-th allocation returns counter value n and
//! the datapoint lives at offset `n - 1`. Offsets are never reused, even when the write
//! that follows an allocation fails.

use std::sync::Arc;

use bytes::Bytes;
use contracts::{ContractError, KvStore, StoreError};
use tracing::{instrument, trace};

use crate::keys;

/// Datapoint log over a `KvStore`
pub struct DatapointLog<S> {
    store: Arc<S>,
}

impl<S> Clone for DatapointLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: KvStore + Sync> DatapointLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Number of allocated offsets
    pub async fn head(&self, pipeline_id: &str) -> Result<u64, ContractError> {
        let key = keys::offset_counter(pipeline_id);
        let value = self.store.incr_by(&key, 0).await?;
        to_offset(&key, value)
    }

    /// Oldest offset guaranteed to be retrievable; 0 until something advances it
    pub async fn retention_boundary(&self, pipeline_id: &str) -> Result<u64, ContractError> {
        let key = keys::retention_boundary(pipeline_id);
        match self.store.get(&key).await? {
            Some(raw) => parse_offset(&key, &raw),
            None => Ok(0),
        }
    }

    /// Reserve the next offset
    pub async fn allocate(&self, pipeline_id: &str) -> Result<u64, ContractError> {
        let key = keys::offset_counter(pipeline_id);
        let value = self.store.incr_by(&key, 1).await?;
        let head = to_offset(&key, value)?;
        // head >= 1 after a successful increment
        Ok(head.saturating_sub(1))
    }

    /// Store a payload under an allocated offset
    pub async fn write(
        &self,
        pipeline_id: &str,
        offset: u64,
        payload: Bytes,
    ) -> Result<(), ContractError> {
        self.store
            .set(&keys::datapoint(pipeline_id, offset), payload)
            .await?;
        Ok(())
    }

    /// Payload at `offset`, `None` when absent
    pub async fn read(&self, pipeline_id: &str, offset: u64) -> Result<Option<Bytes>, ContractError> {
        Ok(self.store.get(&keys::datapoint(pipeline_id, offset)).await?)
    }

    /// Allocate and write in one go
    #[instrument(name = "log_append", skip(self, payload), fields(bytes = payload.len()))]
    pub async fn append(&self, pipeline_id: &str, payload: Bytes) -> Result<u64, ContractError> {
        let offset = self.allocate(pipeline_id).await?;
        self.write(pipeline_id, offset, payload).await?;
        trace!(offset, "datapoint appended");
        Ok(offset)
    }
}

fn to_offset(key: &str, value: i64) -> Result<u64, ContractError> {
    u64::try_from(value)
        .map_err(|_| StoreError::malformed(key, format!("negative offset {value}")).into())
}

/// Parse a decimal offset stored with `set`
pub(crate) fn parse_offset(key: &str, raw: &[u8]) -> Result<u64, ContractError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| StoreError::malformed(key, "value is not an offset").into())
}
