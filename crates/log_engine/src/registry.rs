//! Pipeline registry
//!
//! Only metadata is owned here. Deleting a pipeline leaves its log, cursors and
//! statistics in place, and a later push provisions the metadata again.

use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    ensure_identifier, ContractError, KvStore, Pipeline, PipelineMetadata, PipelinePatch,
};
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::cursor::ConsumerCursors;
use crate::keys;
use crate::statistics::StatisticsAggregator;

/// CRUD over pipeline metadata, hydrating reads with statistics and consumers
pub struct PipelineRegistry<S> {
    store: Arc<S>,
    cursors: ConsumerCursors<S>,
    statistics: StatisticsAggregator<S>,
}

impl<S> Clone for PipelineRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cursors: self.cursors.clone(),
            statistics: self.statistics.clone(),
        }
    }
}

impl<S: KvStore + Sync> PipelineRegistry<S> {
    pub fn new(
        store: Arc<S>,
        cursors: ConsumerCursors<S>,
        statistics: StatisticsAggregator<S>,
    ) -> Self {
        Self {
            store,
            cursors,
            statistics,
        }
    }

    /// Create (or overwrite) a pipeline; an empty id gets a fresh UUID
    #[instrument(name = "pipeline_create", skip(self, pipeline), fields(id = %pipeline.id))]
    pub async fn create(&self, mut pipeline: Pipeline) -> Result<Pipeline, ContractError> {
        if pipeline.id.is_empty() {
            pipeline.id = uuid::Uuid::new_v4().to_string();
        }
        ensure_identifier("id", &pipeline.id)?;
        pipeline.validate()?;

        let metadata = pipeline.metadata();
        self.save(&metadata).await?;
        info!(id = %metadata.id, "pipeline created");
        self.hydrate(metadata).await
    }

    /// Hydrated pipeline, `NotFound` when no metadata exists
    pub async fn get(&self, id: &str) -> Result<Pipeline, ContractError> {
        ensure_identifier("id", id)?;
        let metadata = self
            .load(id)
            .await?
            .ok_or_else(|| ContractError::pipeline_not_found(id))?;
        self.hydrate(metadata).await
    }

    /// Whether a metadata record exists
    pub async fn exists(&self, id: &str) -> Result<bool, ContractError> {
        ensure_identifier("id", id)?;
        Ok(self.store.get(&keys::pipeline(id)).await?.is_some())
    }

    /// Apply a partial update to name and description
    #[instrument(name = "pipeline_update", skip(self, patch))]
    pub async fn update(&self, id: &str, patch: PipelinePatch) -> Result<Pipeline, ContractError> {
        ensure_identifier("id", id)?;
        patch.validate()?;
        let mut metadata = self
            .load(id)
            .await?
            .ok_or_else(|| ContractError::pipeline_not_found(id))?;
        patch.apply(&mut metadata);
        self.save(&metadata).await?;
        self.hydrate(metadata).await
    }

    /// Remove the metadata record
    ///
    /// # Returns
    /// `true` if a record was removed, `false` if none existed
    #[instrument(name = "pipeline_delete", skip(self))]
    pub async fn delete(&self, id: &str) -> Result<bool, ContractError> {
        ensure_identifier("id", id)?;
        let removed = self.store.delete(&keys::pipeline(id)).await?;
        debug!(removed, "pipeline metadata delete");
        Ok(removed)
    }

    /// All pipelines, hydrated and sorted by id
    ///
    /// A record deleted between enumeration and read is skipped; any other failure
    /// aborts the listing.
    pub async fn list(&self) -> Result<Vec<Pipeline>, ContractError> {
        let mut ids: Vec<String> = self
            .store
            .keys_by_prefix(keys::PIPELINES_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(keys::PIPELINES_PREFIX).map(str::to_string))
            .collect();
        ids.sort();

        let mut pipelines = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(metadata) = self.load(&id).await? {
                pipelines.push(self.hydrate(metadata).await?);
            }
        }
        Ok(pipelines)
    }

    /// Get-or-create a minimal record; never overwrites a concurrent create
    ///
    /// # Returns
    /// `true` if this call created the record
    pub async fn ensure(&self, id: &str) -> Result<bool, ContractError> {
        ensure_identifier("pipeline_id", id)?;
        let value = encode(&PipelineMetadata::provisioned(id))?;
        let created = self.store.set_if_absent(&keys::pipeline(id), value).await?;
        if created {
            info!(id, "pipeline provisioned by push");
        }
        Ok(created)
    }

    async fn load(&self, id: &str) -> Result<Option<PipelineMetadata>, ContractError> {
        let key = keys::pipeline(id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| ContractError::Storage {
                message: format!("cannot decode '{key}': {e}"),
                source: Some(Box::new(e)),
            })
    }

    async fn save(&self, metadata: &PipelineMetadata) -> Result<(), ContractError> {
        self.store
            .set(&keys::pipeline(&metadata.id), encode(metadata)?)
            .await?;
        Ok(())
    }

    async fn hydrate(&self, metadata: PipelineMetadata) -> Result<Pipeline, ContractError> {
        let statistic = self.statistics.statistics(&metadata.id).await?;
        let consumers = self.cursors.consumers(&metadata.id).await?;
        let mut pipeline = metadata.into_pipeline();
        pipeline.statistic = statistic;
        pipeline.consumers = consumers;
        Ok(pipeline)
    }
}

fn encode(metadata: &PipelineMetadata) -> Result<Bytes, ContractError> {
    serde_json::to_vec(metadata)
        .map(Bytes::from)
        .map_err(|e| ContractError::Storage {
            message: format!("cannot encode pipeline '{}': {e}", metadata.id),
            source: Some(Box::new(e)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::log::DatapointLog;
    use kv_store::MemoryStore;

    fn registry() -> (Arc<MemoryStore>, PipelineRegistry<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let log = DatapointLog::new(store.clone());
        let cursors = ConsumerCursors::new(store.clone(), log, 1000);
        let statistics = StatisticsAggregator::new(store.clone(), Arc::new(SystemClock), 10);
        (store.clone(), PipelineRegistry::new(store, cursors, statistics))
    }

    #[tokio::test]
    async fn test_create_generates_uuid() {
        let (_, registry) = registry();
        let created = registry.create(Pipeline::new("", "orders")).await.unwrap();
        assert_eq!(created.id.len(), 36);
        assert_eq!(created.statistic.statistics.len(), 10);
        assert_eq!(registry.get(&created.id).await.unwrap().name, "orders");
    }

    #[tokio::test]
    async fn test_create_existing_id_overwrites() {
        let (_, registry) = registry();
        registry
            .create(Pipeline::new("p1", "a").with_description("first"))
            .await
            .unwrap();
        registry.create(Pipeline::new("p1", "b")).await.unwrap();
        let pipeline = registry.get("p1").await.unwrap();
        assert_eq!(pipeline.name, "b");
        assert_eq!(pipeline.description, "");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_, registry) = registry();
        assert!(matches!(
            registry.get("nope").await,
            Err(ContractError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let (_, registry) = registry();
        registry
            .create(Pipeline::new("p1", "orders").with_description("all orders"))
            .await
            .unwrap();
        let updated = registry
            .update(
                "p1",
                PipelinePatch {
                    name: Some("orders-v2".into()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "orders-v2");
        assert_eq!(updated.description, "all orders");

        assert!(matches!(
            registry.update("ghost", PipelinePatch::default()).await,
            Err(ContractError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_, registry) = registry();
        registry.create(Pipeline::new("p1", "orders")).await.unwrap();
        assert!(registry.delete("p1").await.unwrap());
        assert!(!registry.delete("p1").await.unwrap());
        assert!(registry.get("p1").await.is_err());
        assert!(!registry.exists("p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_does_not_clobber() {
        let (_, registry) = registry();
        registry.create(Pipeline::new("p1", "orders")).await.unwrap();
        assert!(!registry.ensure("p1").await.unwrap());
        assert_eq!(registry.get("p1").await.unwrap().name, "orders");

        assert!(registry.ensure("p2").await.unwrap());
        assert_eq!(registry.get("p2").await.unwrap().name, "p2");
    }

    #[tokio::test]
    async fn test_list_sorted_and_ignores_log_keys() {
        let (store, registry) = registry();
        for id in ["b", "a", "c"] {
            registry.create(Pipeline::new(id, id)).await.unwrap();
        }
        store
            .set(&keys::offset_counter("a"), Bytes::from("3"))
            .await
            .unwrap();

        let ids: Vec<_> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_storage_error() {
        let (store, registry) = registry();
        store
            .set(&keys::pipeline("p1"), Bytes::from("not json"))
            .await
            .unwrap();
        assert!(matches!(
            registry.get("p1").await,
            Err(ContractError::Storage { .. })
        ));
        assert!(registry.list().await.is_err());
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (_, registry) = registry();
        assert!(matches!(
            registry.create(Pipeline::new("a:b", "x")).await,
            Err(ContractError::Validation { .. })
        ));
        let err = registry
            .create(Pipeline::new("p1", "n".repeat(300)))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Validation { ref field, .. } if field == "name"));
    }
}
