//! # Broker
//!
//! Facade over the log engine and the ingestion pipeline. This is the one surface the
//! HTTP layer and the CLI talk to.
//!
//! ```ignore
//! let broker = Broker::start(store, Arc::new(SystemClock), &config);
//! broker.push_datapoint("p1", Bytes::from("a")).await?;
//! let batch = broker.pop_datapoints("p1", "c1", None).await?;
//! broker.shutdown().await;
//! ```

use std::sync::Arc;

use bytes::Bytes;
use contracts::{
    ensure_identifier, ContractError, Datapoint, KvStore, Pipeline, PipelinePatch,
    PipelineStatistic, TurbineConfig,
};
use ingestion::IngestionPipeline;
use log_engine::{Clock, EngineSettings, LogEngine};
use tracing::{debug, info, instrument};

pub use ingestion::{FailureReceiver, IngestionFailure, MetricsSnapshot};

/// Message broker: pipeline CRUD, push, pop and statistics
pub struct Broker<S> {
    engine: LogEngine<S>,
    ingestion: Arc<IngestionPipeline>,
}

impl<S> Clone for Broker<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            ingestion: self.ingestion.clone(),
        }
    }
}

impl<S: KvStore + Sync + 'static> Broker<S> {
    /// Wire the engine and start the ingestion workers
    pub fn start(store: Arc<S>, clock: Arc<dyn Clock>, config: &TurbineConfig) -> Self {
        let engine = LogEngine::new(store, clock, EngineSettings::from_config(config));
        let ingestion = IngestionPipeline::start(engine.clone(), config.ingestion.clone());
        info!(
            writers = config.ingestion.writers,
            batch_limit = config.consumer.batch_limit,
            "broker started"
        );
        Self {
            engine,
            ingestion: Arc::new(ingestion),
        }
    }

    pub async fn create_pipeline(&self, pipeline: Pipeline) -> Result<Pipeline, ContractError> {
        self.engine.registry().create(pipeline).await
    }

    pub async fn get_pipeline(&self, id: &str) -> Result<Pipeline, ContractError> {
        self.engine.registry().get(id).await
    }

    pub async fn update_pipeline(
        &self,
        id: &str,
        patch: PipelinePatch,
    ) -> Result<Pipeline, ContractError> {
        self.engine.registry().update(id, patch).await
    }

    /// `true` if a record was removed; deleting a missing pipeline is not an error
    pub async fn delete_pipeline(&self, id: &str) -> Result<bool, ContractError> {
        self.engine.registry().delete(id).await
    }

    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>, ContractError> {
        self.engine.registry().list().await
    }

    /// Statistics of an existing pipeline
    pub async fn get_statistics(&self, id: &str) -> Result<PipelineStatistic, ContractError> {
        if !self.engine.registry().exists(id).await? {
            return Err(ContractError::pipeline_not_found(id));
        }
        self.engine.statistics().statistics(id).await
    }

    /// Queue a datapoint; the pipeline is provisioned on write if unknown
    ///
    /// Returns once the datapoint is queued, not once it is written.
    #[instrument(name = "broker_push", skip(self, payload), fields(bytes = payload.len()))]
    pub async fn push_datapoint(&self, id: &str, payload: Bytes) -> Result<(), ContractError> {
        ensure_identifier("pipeline_id", id)?;
        self.ingestion
            .enqueue(Datapoint::new(id, payload))
            .await
            .map_err(ContractError::from)
    }

    /// Next batch for `consumer`; `limit` defaults to the configured batch size
    #[instrument(name = "broker_pop", skip(self))]
    pub async fn pop_datapoints(
        &self,
        id: &str,
        consumer: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Bytes>, ContractError> {
        let limit = limit.unwrap_or(self.engine.settings().batch_limit);
        let batch = self.engine.cursors().pop(id, consumer, limit).await?;
        observability::record_datapoints_popped(id, batch.len());
        debug!(delivered = batch.len(), "datapoints popped");
        Ok(batch)
    }

    /// Store liveness
    pub async fn health(&self) -> Result<(), ContractError> {
        self.engine.store().ping().await?;
        Ok(())
    }

    /// Failure reports of exhausted datapoints; handed out once
    pub fn take_failures(&self) -> Option<FailureReceiver> {
        self.ingestion.take_failures()
    }

    pub fn ingestion_metrics(&self) -> MetricsSnapshot {
        self.ingestion.snapshot()
    }

    pub fn engine(&self) -> &LogEngine<S> {
        &self.engine
    }

    /// Stop accepting pushes and wait until queued datapoints are written
    pub async fn shutdown(&self) {
        self.ingestion.shutdown().await;
        info!("broker stopped");
    }
}
