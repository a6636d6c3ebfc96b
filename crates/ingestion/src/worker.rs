//! Supervised ingestion workers
//!
//! Every worker pulls from the shared receiver, so one slow or failing datapoint only
//! occupies its own worker. The supervisor restarts a worker whose loop ended on a store
//! outage or a panic, and exits once the queue is closed and empty.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::{Receiver, Sender, TrySendError};
use contracts::{ContractError, Datapoint, IngestionConfig, KvStore};
use futures::FutureExt;
use log_engine::LogEngine;
use tokio::time::sleep;
use tracing::{debug, error, instrument, trace, warn};

use crate::error::{IngestionError, IngestionFailure};
use crate::metrics::IngestionMetrics;

/// Why a worker loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    /// Queue closed and empty
    Drained,
    /// Store unreachable; restart after backoff
    Disconnected,
    /// A datapoint panicked; it was reported, restart after backoff
    Panicked,
}

/// Steps already completed for one datapoint, kept across retries
#[derive(Debug, Default)]
struct Progress {
    ensured: bool,
    offset: Option<u64>,
    written: bool,
}

pub(crate) struct Worker<S> {
    id: usize,
    engine: LogEngine<S>,
    rx: Receiver<Datapoint>,
    failures: Sender<IngestionFailure>,
    metrics: Arc<IngestionMetrics>,
    config: IngestionConfig,
}

impl<S> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            engine: self.engine.clone(),
            rx: self.rx.clone(),
            failures: self.failures.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: KvStore + Sync + 'static> Worker<S> {
    pub(crate) fn new(
        id: usize,
        engine: LogEngine<S>,
        rx: Receiver<Datapoint>,
        failures: Sender<IngestionFailure>,
        metrics: Arc<IngestionMetrics>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            id,
            engine,
            rx,
            failures,
            metrics,
            config,
        }
    }

    /// Run the worker until the queue is drained, restarting it when it dies
    #[instrument(name = "ingestion_worker", skip(self), fields(worker = self.id))]
    pub(crate) async fn supervise(self) {
        loop {
            let inner = self.clone();
            let reason = match tokio::spawn(async move { inner.run().await }).await {
                Ok(WorkerExit::Drained) => break,
                Ok(WorkerExit::Disconnected) => "disconnected",
                Ok(WorkerExit::Panicked) => "panic",
                Err(e) if e.is_panic() => {
                    error!(worker = self.id, "ingestion worker panicked");
                    "panic"
                }
                Err(_) => break,
            };

            if self.rx.is_closed() && self.rx.is_empty() {
                break;
            }

            self.metrics.record_worker_restart();
            observability::record_worker_restart(self.id, reason);
            warn!(
                worker = self.id,
                reason,
                backoff_ms = self.config.restart_backoff_ms,
                "restarting ingestion worker"
            );
            sleep(Duration::from_millis(self.config.restart_backoff_ms)).await;
        }
        debug!(worker = self.id, "ingestion worker stopped");
    }

    async fn run(&self) -> WorkerExit {
        if let Err(e) = self.engine.store().ping().await {
            if self.rx.is_closed() {
                self.drain_as_failed(e.into());
                return WorkerExit::Drained;
            }
            warn!(worker = self.id, error = %e, "store connection failed");
            return WorkerExit::Disconnected;
        }
        trace!(worker = self.id, "ingestion worker connected");

        while let Ok(datapoint) = self.rx.recv().await {
            self.metrics.update_queue_len(self.rx.len());
            observability::record_queue_depth(self.rx.len());

            let started = Instant::now();
            let mut progress = Progress::default();
            let outcome = AssertUnwindSafe(self.ingest(&datapoint, &mut progress))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(offset)) => {
                    self.record_written(&datapoint, started);
                    trace!(
                        worker = self.id,
                        pipeline_id = %datapoint.pipeline_id,
                        offset,
                        "datapoint written"
                    );
                }
                Ok(Err(err)) => {
                    let disconnected = err.is_store_unavailable();
                    if progress.written {
                        self.record_written(&datapoint, started);
                    }
                    self.report(datapoint, &progress, err);
                    if disconnected {
                        return WorkerExit::Disconnected;
                    }
                }
                Err(panic) => {
                    let err = IngestionError::WorkerPanicked {
                        pipeline_id: datapoint.pipeline_id.clone(),
                        message: panic_message(panic.as_ref()),
                    };
                    self.report(datapoint, &progress, err);
                    return WorkerExit::Panicked;
                }
            }
        }
        WorkerExit::Drained
    }

    /// Write one datapoint, retrying failed steps with linear backoff
    async fn ingest(
        &self,
        datapoint: &Datapoint,
        progress: &mut Progress,
    ) -> Result<u64, IngestionError> {
        let mut attempt: u32 = 0;
        loop {
            match self.step(datapoint, progress).await {
                Ok(offset) => return Ok(offset),
                Err(e) if attempt < self.config.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    self.metrics.record_retry();
                    observability::record_ingestion_retry();
                    debug!(
                        worker = self.id,
                        pipeline_id = %datapoint.pipeline_id,
                        attempt,
                        error = %e,
                        "retrying datapoint"
                    );
                    let backoff = self.config.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(source) => {
                    return Err(IngestionError::RetriesExhausted {
                        pipeline_id: datapoint.pipeline_id.clone(),
                        attempts: attempt + 1,
                        source,
                    })
                }
            }
        }
    }

    async fn step(&self, datapoint: &Datapoint, progress: &mut Progress) -> Result<u64, ContractError> {
        let pipeline_id = datapoint.pipeline_id.as_str();

        if !progress.ensured {
            self.engine.registry().ensure(pipeline_id).await?;
            progress.ensured = true;
        }

        let offset = match progress.offset {
            Some(offset) => offset,
            None => {
                let offset = self.engine.log().allocate(pipeline_id).await?;
                progress.offset = Some(offset);
                offset
            }
        };

        if !progress.written {
            self.engine
                .log()
                .write(pipeline_id, offset, datapoint.payload.clone())
                .await?;
            progress.written = true;
        }

        self.engine.statistics().record_intake(pipeline_id).await?;
        Ok(offset)
    }

    fn record_written(&self, datapoint: &Datapoint, started: Instant) {
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_written(latency_ms);
        observability::record_datapoint_written(&datapoint.pipeline_id, latency_ms);
    }

    /// Publish a failure report
    ///
    /// A datapoint whose payload already reached the log is readable by consumers and is
    /// reported with `written = true`; only its intake count is missing.
    fn report(&self, datapoint: Datapoint, progress: &Progress, err: IngestionError) {
        let attempts = match &err {
            IngestionError::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        };
        if progress.written {
            self.metrics.record_intake_missed();
            observability::record_intake_missed(&datapoint.pipeline_id);
            warn!(
                worker = self.id,
                pipeline_id = %datapoint.pipeline_id,
                offset = ?progress.offset,
                attempts,
                error = %err,
                "datapoint written but daily intake not counted"
            );
        } else {
            self.metrics.record_failed();
            observability::record_datapoint_failed(&datapoint.pipeline_id);
            error!(
                worker = self.id,
                pipeline_id = %datapoint.pipeline_id,
                offset = ?progress.offset,
                attempts,
                error = %err,
                "datapoint ingestion failed"
            );
        }

        let failure = IngestionFailure {
            pipeline_id: datapoint.pipeline_id,
            payload: datapoint.payload,
            offset: progress.offset,
            attempts,
            written: progress.written,
            error: err.to_string(),
        };
        match self.failures.try_send(failure) {
            Ok(()) => {}
            Err(TrySendError::Full(f)) => {
                self.metrics.record_failure_dropped();
                error!(pipeline_id = %f.pipeline_id, "failure channel full, report dropped");
            }
            // Nobody listens for failures anymore; the log line above is the report
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Fail everything left in a closed queue when the store is gone for good
    fn drain_as_failed(&self, cause: ContractError) {
        let message = cause.to_string();
        while let Ok(datapoint) = self.rx.try_recv() {
            let pipeline_id = datapoint.pipeline_id.clone();
            self.report(
                datapoint,
                &Progress::default(),
                IngestionError::RetriesExhausted {
                    pipeline_id,
                    attempts: 0,
                    source: ContractError::storage(message.clone()),
                },
            );
        }
    }
}

fn is_retryable(err: &ContractError) -> bool {
    !matches!(err, ContractError::Validation { .. }) && !err.is_store_malformed()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
