//! Server orchestrator - wires store, broker, HTTP and snapshots together.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use broker::{Broker, FailureReceiver};
use contracts::{KvStore, StoreBackend, TurbineConfig};
use kv_store::{MemoryStore, RedisStore};
use log_engine::SystemClock;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::ServerStats;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Effective service configuration (file + overrides)
    pub turbine: TurbineConfig,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main server orchestrator
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Serve until `shutdown` resolves, then drain ingestion and persist the store
    pub async fn run<F>(self, shutdown: F) -> Result<ServerStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let start_time = Instant::now();
        let config = &self.config.turbine;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        match config.store.backend {
            StoreBackend::Memory => {
                let store = Arc::new(open_store(config.store.snapshot_path.clone()).await?);
                info!(keys = store.len(), "Store ready");
                let snapshots = config
                    .store
                    .snapshot_path
                    .clone()
                    .map(|path| (store.clone(), path));

                let mut stats = serve(config, store.clone(), snapshots, shutdown).await?;
                stats.store_keys = Some(store.len());
                stats.uptime = start_time.elapsed();
                Ok(stats)
            }
            StoreBackend::Redis => {
                let store = RedisStore::connect(&config.store.redis_url)
                    .await
                    .with_context(|| format!("Failed to connect to {}", config.store.redis_url))?;
                info!(redis_url = %config.store.redis_url, "Store ready");

                let mut stats = serve(config, Arc::new(store), None, shutdown).await?;
                stats.uptime = start_time.elapsed();
                Ok(stats)
            }
        }
    }
}

/// Run broker and HTTP over `store` until shutdown
///
/// `snapshots` is set only for the in-memory backend; its store is saved periodically
/// and once more after the writers drained.
async fn serve<S, F>(
    config: &TurbineConfig,
    store: Arc<S>,
    snapshots: Option<(Arc<MemoryStore>, PathBuf)>,
    shutdown: F,
) -> Result<ServerStats>
where
    S: KvStore + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let broker = Broker::start(store, Arc::new(SystemClock), config);
    let failure_logger = broker.take_failures().map(spawn_failure_logger);

    let (stop_tx, stop_rx) = watch::channel(false);
    let snapshotter = snapshots.clone().map(|(store, path)| {
        spawn_snapshotter(
            store,
            path,
            Duration::from_secs(config.store.snapshot_interval_secs.max(1)),
            stop_rx,
        )
    });

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    let served = api::serve(listener, broker.clone(), shutdown).await;
    if let Err(ref e) = served {
        error!(error = %e, "HTTP server failed");
    }

    // Stop accepting work, then let the writers drain the queue
    broker.shutdown().await;

    if let Some(handle) = failure_logger {
        if let Err(e) = handle.await {
            warn!(error = %e, "Failure logger task ended abnormally");
        }
    }

    let _ = stop_tx.send(true);
    if let Some(handle) = snapshotter {
        if let Err(e) = handle.await {
            warn!(error = %e, "Snapshot task ended abnormally");
        }
    }

    let mut saved_keys = None;
    if let Some((store, path)) = snapshots {
        let keys = save_snapshot(store, path.clone())
            .await
            .with_context(|| format!("Failed to save final snapshot to {}", path.display()))?;
        info!(path = %path.display(), keys, "Final snapshot saved");
        saved_keys = Some(keys);
    }

    served.context("HTTP server failed")?;

    Ok(ServerStats {
        ingestion: broker.ingestion_metrics(),
        snapshot_keys: saved_keys,
        ..Default::default()
    })
}

/// Open the store, restoring the snapshot when one is configured
async fn open_store(snapshot_path: Option<PathBuf>) -> Result<MemoryStore> {
    let Some(path) = snapshot_path else {
        info!("No snapshot configured, data is kept in memory only");
        return Ok(MemoryStore::new());
    };

    info!(path = %path.display(), "Restoring store snapshot");
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || MemoryStore::open(&path))
        .await
        .context("Snapshot loader panicked")?
        .with_context(|| format!("Failed to load snapshot {display}"))
}

async fn save_snapshot(store: Arc<MemoryStore>, path: PathBuf) -> Result<usize> {
    let keys = tokio::task::spawn_blocking(move || store.save_snapshot(&path))
        .await
        .context("Snapshot writer panicked")??;
    Ok(keys)
}

/// Periodically persist the store until `stop` flips to true
fn spawn_snapshotter(
    store: Arc<MemoryStore>,
    path: PathBuf,
    every: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // first tick fires immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match save_snapshot(store.clone(), path.clone()).await {
                        Ok(keys) => tracing::debug!(keys, "Periodic snapshot saved"),
                        Err(e) => error!(error = %e, path = %path.display(), "Periodic snapshot failed"),
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Log every failure report from the writers
///
/// A written datapoint is still readable and only misses its daily intake count.
/// Ends once all writers have exited and dropped their senders.
fn spawn_failure_logger(failures: FailureReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(failure) = failures.recv().await {
            if failure.written {
                warn!(
                    pipeline_id = %failure.pipeline_id,
                    offset = ?failure.offset,
                    error = %failure.error,
                    "Datapoint stored but not counted in daily statistics"
                );
            } else {
                error!(
                    pipeline_id = %failure.pipeline_id,
                    offset = ?failure.offset,
                    attempts = failure.attempts,
                    payload_len = failure.payload.len(),
                    error = %failure.error,
                    "Datapoint dropped after ingestion failure"
                );
            }
        }
    })
}
