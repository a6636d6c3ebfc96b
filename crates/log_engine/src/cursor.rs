//! Consumer cursors
//!
//! A cursor is the offset of a consumer's next unread datapoint. It does not exist until
//! the consumer's first pop, at which point it starts at the retention boundary. Two pops
//! by the same consumer may race and deliver a range twice; different consumers never
//! interfere.

use std::sync::Arc;

use bytes::Bytes;
use contracts::{ensure_identifier, Consumer, ContractError, KvStore};
use tracing::{debug, instrument};

use crate::keys;
use crate::log::{parse_offset, DatapointLog};

/// Cursor bookkeeping for every (pipeline, consumer) pair
pub struct ConsumerCursors<S> {
    store: Arc<S>,
    log: DatapointLog<S>,
    max_batch_limit: usize,
}

impl<S> Clone for ConsumerCursors<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            log: self.log.clone(),
            max_batch_limit: self.max_batch_limit,
        }
    }
}

impl<S: KvStore + Sync> ConsumerCursors<S> {
    pub fn new(store: Arc<S>, log: DatapointLog<S>, max_batch_limit: usize) -> Self {
        Self {
            store,
            log,
            max_batch_limit: max_batch_limit.max(1),
        }
    }

    /// Read the next batch for a consumer and advance its cursor
    ///
    /// `limit` must be at least 1 and is capped at the configured maximum. The cursor
    /// moves by the number of offsets scanned; offsets without a record are skipped, so
    /// the result may be shorter than the scan.
    #[instrument(name = "consumer_pop", skip(self))]
    pub async fn pop(
        &self,
        pipeline_id: &str,
        consumer_id: &str,
        limit: usize,
    ) -> Result<Vec<Bytes>, ContractError> {
        ensure_identifier("pipeline_id", pipeline_id)?;
        ensure_identifier("consumer", consumer_id)?;
        if limit == 0 {
            return Err(ContractError::validation("limit", "limit must be at least 1"));
        }
        let limit = limit.min(self.max_batch_limit) as u64;

        self.store
            .set_add(&keys::consumer_set(pipeline_id), consumer_id)
            .await?;

        let head = self.log.head(pipeline_id).await?;
        let boundary = self.log.retention_boundary(pipeline_id).await?;
        let stored = self.cursor(pipeline_id, consumer_id).await?;
        let cursor = stored.unwrap_or(boundary).max(boundary);

        let scan = head.saturating_sub(cursor).min(limit);
        if scan == 0 {
            if stored != Some(cursor) {
                self.store_cursor(pipeline_id, consumer_id, cursor).await?;
            }
            return Ok(Vec::new());
        }

        let mut batch = Vec::with_capacity(scan as usize);
        for offset in cursor..cursor + scan {
            if let Some(payload) = self.log.read(pipeline_id, offset).await? {
                batch.push(payload);
            }
        }
        self.store_cursor(pipeline_id, consumer_id, cursor + scan)
            .await?;

        debug!(
            from = cursor,
            to = cursor + scan,
            delivered = batch.len(),
            "cursor advanced"
        );
        Ok(batch)
    }

    /// Datapoints between the consumer's cursor and the head
    pub async fn unread_count(
        &self,
        pipeline_id: &str,
        consumer_id: &str,
    ) -> Result<u64, ContractError> {
        let head = self.log.head(pipeline_id).await?;
        let boundary = self.log.retention_boundary(pipeline_id).await?;
        let cursor = self
            .cursor(pipeline_id, consumer_id)
            .await?
            .unwrap_or(boundary)
            .max(boundary);
        Ok(head.saturating_sub(cursor))
    }

    /// Registered consumers with their backlog, sorted by id
    pub async fn consumers(&self, pipeline_id: &str) -> Result<Vec<Consumer>, ContractError> {
        let mut ids = self
            .store
            .set_members(&keys::consumer_set(pipeline_id))
            .await?;
        ids.sort();

        let mut consumers = Vec::with_capacity(ids.len());
        for id in ids {
            let unread_elements = self.unread_count(pipeline_id, &id).await?;
            consumers.push(Consumer {
                id,
                unread_elements,
            });
        }
        Ok(consumers)
    }

    /// Stored cursor, `None` before the first pop
    pub async fn cursor(
        &self,
        pipeline_id: &str,
        consumer_id: &str,
    ) -> Result<Option<u64>, ContractError> {
        let key = keys::cursor(pipeline_id, consumer_id);
        match self.store.get(&key).await? {
            Some(raw) => parse_offset(&key, &raw).map(Some),
            None => Ok(None),
        }
    }

    async fn store_cursor(
        &self,
        pipeline_id: &str,
        consumer_id: &str,
        cursor: u64,
    ) -> Result<(), ContractError> {
        self.store
            .set(
                &keys::cursor(pipeline_id, consumer_id),
                Bytes::from(cursor.to_string()),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        log: DatapointLog<MemoryStore>,
        cursors: ConsumerCursors<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let log = DatapointLog::new(store.clone());
        let cursors = ConsumerCursors::new(store.clone(), log.clone(), 1000);
        Fixture {
            store,
            log,
            cursors,
        }
    }

    async fn push_n(log: &DatapointLog<MemoryStore>, pipeline: &str, n: usize) {
        for i in 0..n {
            log.append(pipeline, Bytes::from(format!("v{i}"))).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_pop_reads_in_order_then_empty() {
        let f = fixture();
        for v in ["a", "b", "c"] {
            f.log.append("p1", Bytes::from(v)).await.unwrap();
        }

        let batch = f.cursors.pop("p1", "c1", 10).await.unwrap();
        assert_eq!(batch, vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]);
        assert_eq!(f.cursors.cursor("p1", "c1").await.unwrap(), Some(3));

        assert!(f.cursors.pop("p1", "c1", 10).await.unwrap().is_empty());
        assert_eq!(f.cursors.cursor("p1", "c1").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_pop_respects_batch_limit() {
        let f = fixture();
        push_n(&f.log, "p2", 15).await;

        let first = f.cursors.pop("p2", "c1", 10).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], Bytes::from("v0"));
        assert_eq!(first[9], Bytes::from("v9"));
        assert_eq!(f.cursors.unread_count("p2", "c1").await.unwrap(), 5);

        let second = f.cursors.pop("p2", "c1", 10).await.unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(f.cursors.unread_count("p2", "c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_consumers_are_independent() {
        let f = fixture();
        push_n(&f.log, "p1", 4).await;

        f.cursors.pop("p1", "b", 1).await.unwrap();
        assert_eq!(f.cursors.unread_count("p1", "b").await.unwrap(), 3);

        f.cursors.pop("p1", "a", 10).await.unwrap();
        assert_eq!(f.cursors.unread_count("p1", "a").await.unwrap(), 0);
        assert_eq!(f.cursors.unread_count("p1", "b").await.unwrap(), 3);

        let consumers = f.cursors.consumers("p1").await.unwrap();
        let ids: Vec<_> = consumers.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(consumers[1].unread_elements, 3);
    }

    #[tokio::test]
    async fn test_missing_records_are_skipped_but_scanned() {
        let f = fixture();
        push_n(&f.log, "p1", 3).await;
        f.store.delete(&keys::datapoint("p1", 1)).await.unwrap();

        let batch = f.cursors.pop("p1", "c1", 10).await.unwrap();
        assert_eq!(batch, vec![Bytes::from("v0"), Bytes::from("v2")]);
        assert_eq!(f.cursors.cursor("p1", "c1").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_cursor_below_boundary_catches_up() {
        let f = fixture();
        push_n(&f.log, "p1", 5).await;
        f.store
            .set(&keys::retention_boundary("p1"), Bytes::from("3"))
            .await
            .unwrap();

        assert_eq!(f.cursors.unread_count("p1", "c1").await.unwrap(), 2);
        let batch = f.cursors.pop("p1", "c1", 10).await.unwrap();
        assert_eq!(batch, vec![Bytes::from("v3"), Bytes::from("v4")]);
    }

    #[tokio::test]
    async fn test_first_pop_on_empty_log_registers_consumer() {
        let f = fixture();
        assert!(f.cursors.pop("ghost", "c1", 10).await.unwrap().is_empty());
        assert_eq!(f.cursors.cursor("ghost", "c1").await.unwrap(), Some(0));
        assert_eq!(f.cursors.consumers("ghost").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let f = fixture();
        assert!(matches!(
            f.cursors.pop("p1", "c1", 0).await,
            Err(ContractError::Validation { .. })
        ));
        assert!(matches!(
            f.cursors.pop("p1", "bad:id", 10).await,
            Err(ContractError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_limit_capped_by_max() {
        let store = Arc::new(MemoryStore::new());
        let log = DatapointLog::new(store.clone());
        let cursors = ConsumerCursors::new(store, log.clone(), 2);
        push_n(&log, "p1", 5).await;

        assert_eq!(cursors.pop("p1", "c1", 100).await.unwrap().len(), 2);
    }
}
