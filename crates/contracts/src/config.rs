//! TurbineConfig - Config Loader output
//!
//! Describes the full service configuration: HTTP bind, store backend, ingestion
//! pool, consumer batching and statistics window. Every section has defaults so an
//! empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurbineConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Key-value store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Ingestion worker pool
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Consumer pop batching
    #[serde(default)]
    pub consumer: ConsumerConfig,

    /// Daily statistics
    #[serde(default)]
    pub statistics: StatisticsConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. "0.0.0.0:3000"
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

/// Store backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process store, optionally snapshotted to disk
    #[default]
    Memory,
    /// External Redis server; persistence is Redis' own concern
    Redis,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL, used when `backend = "redis"`
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Snapshot file; `None` keeps data in memory only
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Seconds between periodic snapshots
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: default_redis_url(),
            snapshot_path: None,
            snapshot_interval_secs: default_snapshot_interval(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_snapshot_interval() -> u64 {
    30
}

/// Ingestion worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Number of concurrent writers
    #[serde(default = "default_writers")]
    pub writers: usize,

    /// Producer queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long a producer waits on a full queue before `Busy`
    #[serde(default = "default_enqueue_timeout")]
    pub enqueue_timeout_ms: u64,

    /// Retries per datapoint after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries (grows linearly per attempt)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Delay before a terminated worker is restarted
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_ms: u64,

    /// Capacity of the failure report channel
    #[serde(default = "default_failure_capacity")]
    pub failure_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            writers: default_writers(),
            queue_capacity: default_queue_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            restart_backoff_ms: default_restart_backoff(),
            failure_capacity: default_failure_capacity(),
        }
    }
}

fn default_writers() -> usize {
    100
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_enqueue_timeout() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    50
}

fn default_restart_backoff() -> u64 {
    500
}

fn default_failure_capacity() -> usize {
    1024
}

/// Consumer batching configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Datapoints returned per pop when the caller gives no limit
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Upper bound for caller-supplied limits
    #[serde(default = "default_max_batch_limit")]
    pub max_batch_limit: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            max_batch_limit: default_max_batch_limit(),
        }
    }
}

fn default_batch_limit() -> usize {
    10
}

fn default_max_batch_limit() -> usize {
    1000
}

/// Statistics configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Length of the trailing intake window, today included
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

fn default_window_days() -> u32 {
    10
}
