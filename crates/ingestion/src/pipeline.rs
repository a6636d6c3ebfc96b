//! Ingestion Pipeline main entry

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{Datapoint, IngestionConfig, KvStore};
use log_engine::LogEngine;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::error::{IngestionError, IngestionFailure, Result};
use crate::metrics::{IngestionMetrics, MetricsSnapshot};
use crate::FailureReceiver;
use crate::worker::Worker;

/// Ingestion Pipeline
///
/// A bounded queue drained by a fixed pool of supervised workers. Each datapoint is
/// provisioned, appended and counted by exactly one worker.
pub struct IngestionPipeline {
    /// Producer side of the queue
    tx: Sender<Datapoint>,

    /// Consumer side held by the pipeline itself, so the queue stays open while no
    /// worker is running
    rx: Receiver<Datapoint>,

    /// Failure reports, handed out once
    failures: std::sync::Mutex<Option<Receiver<IngestionFailure>>>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Supervisor tasks
    workers: Mutex<Vec<JoinHandle<()>>>,

    config: IngestionConfig,
}

impl IngestionPipeline {
    /// Spawn `config.writers` workers on the current runtime
    #[instrument(name = "ingestion_start", skip(engine, config), fields(writers = config.writers))]
    pub fn start<S: KvStore + Sync + 'static>(engine: LogEngine<S>, config: IngestionConfig) -> Self {
        let (tx, rx) = bounded(config.queue_capacity.max(1));
        let (failure_tx, failure_rx) = bounded(config.failure_capacity.max(1));
        let metrics = Arc::new(IngestionMetrics::new());

        let workers = (0..config.writers)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    engine.clone(),
                    rx.clone(),
                    failure_tx.clone(),
                    metrics.clone(),
                    config.clone(),
                );
                tokio::spawn(worker.supervise())
            })
            .collect();

        info!(
            writers = config.writers,
            queue_capacity = config.queue_capacity,
            "ingestion pipeline started"
        );

        Self {
            tx,
            rx,
            failures: std::sync::Mutex::new(Some(failure_rx)),
            metrics,
            workers: Mutex::new(workers),
            config,
        }
    }

    /// Admit a datapoint to the queue
    ///
    /// Returns as soon as the datapoint is queued. On a full queue the call waits up to
    /// `enqueue_timeout_ms` and then fails with `QueueFull`.
    pub async fn enqueue(&self, datapoint: Datapoint) -> Result<()> {
        let pipeline_id = datapoint.pipeline_id.clone();
        match self.tx.try_send(datapoint) {
            Ok(()) => {}
            Err(TrySendError::Closed(_)) => return Err(IngestionError::Closed),
            Err(TrySendError::Full(datapoint)) => {
                let started = Instant::now();
                let timeout = Duration::from_millis(self.config.enqueue_timeout_ms);
                match tokio::time::timeout(timeout, self.tx.send(datapoint)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => return Err(IngestionError::Closed),
                    Err(_) => {
                        let waited_ms = started.elapsed().as_millis() as u64;
                        debug!(pipeline_id = %pipeline_id, waited_ms, "ingestion queue full");
                        return Err(IngestionError::QueueFull {
                            pipeline_id,
                            waited_ms,
                        });
                    }
                }
            }
        }

        self.metrics.record_received();
        self.metrics.update_queue_len(self.tx.len());
        observability::record_datapoint_enqueued(&pipeline_id);
        observability::record_queue_depth(self.tx.len());
        Ok(())
    }

    /// Take the failure report receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_failures(&self) -> Option<FailureReceiver> {
        self.failures.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Datapoints waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.rx.len()
    }

    /// Whether `shutdown` has been called
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Stop accepting datapoints, drain the queue and wait for every worker
    #[instrument(name = "ingestion_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        self.tx.close();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        info!(workers = workers.len(), pending = self.tx.len(), "draining ingestion queue");
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = ?e, "ingestion supervisor task failed");
            }
        }
        self.metrics.update_queue_len(self.tx.len());
        debug!("ingestion pipeline shutdown complete");
    }
}
