//! # Log Engine
//!
//! Pipeline log engine on top of a `KvStore`.
//!
//! Responsible for:
//! - Pipeline metadata CRUD (`PipelineRegistry`)
//! - Atomic offset allocation and datapoint storage (`DatapointLog`)
//! - Per-consumer cursors (`ConsumerCursors`)
//! - Daily intake counters (`StatisticsAggregator`)
//!
//! ## Usage
//!
//! ```ignore
//! use log_engine::{EngineSettings, LogEngine, SystemClock};
//!
//! let engine = LogEngine::new(store, Arc::new(SystemClock), EngineSettings::default());
//! engine.registry().ensure("p1").await?;
//! let offset = engine.log().append("p1", Bytes::from("hello")).await?;
//! engine.statistics().record_intake("p1").await?;
//! let batch = engine.cursors().pop("p1", "c1", 10).await?;
//! ```

mod clock;
mod cursor;
pub mod keys;
mod log;
mod registry;
mod statistics;

use std::sync::Arc;

use contracts::{KvStore, TurbineConfig};

pub use clock::{Clock, FixedClock, SystemClock};
pub use cursor::ConsumerCursors;
pub use log::DatapointLog;
pub use registry::PipelineRegistry;
pub use statistics::{change_rate, StatisticsAggregator};

/// Tunables taken from `TurbineConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Pop size when the caller gives none
    pub batch_limit: usize,
    /// Cap on caller-supplied pop sizes
    pub max_batch_limit: usize,
    /// Trailing statistics window in days
    pub window_days: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&TurbineConfig::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &TurbineConfig) -> Self {
        Self {
            batch_limit: config.consumer.batch_limit,
            max_batch_limit: config.consumer.max_batch_limit,
            window_days: config.statistics.window_days,
        }
    }
}

/// All engine components wired to one store and clock
pub struct LogEngine<S> {
    store: Arc<S>,
    settings: EngineSettings,
    registry: PipelineRegistry<S>,
    log: DatapointLog<S>,
    cursors: ConsumerCursors<S>,
    statistics: StatisticsAggregator<S>,
}

impl<S> Clone for LogEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            settings: self.settings,
            registry: self.registry.clone(),
            log: self.log.clone(),
            cursors: self.cursors.clone(),
            statistics: self.statistics.clone(),
        }
    }
}

impl<S: KvStore + Sync> LogEngine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        let log = DatapointLog::new(store.clone());
        let cursors = ConsumerCursors::new(store.clone(), log.clone(), settings.max_batch_limit);
        let statistics = StatisticsAggregator::new(store.clone(), clock, settings.window_days);
        let registry = PipelineRegistry::new(store.clone(), cursors.clone(), statistics.clone());
        Self {
            store,
            settings,
            registry,
            log,
            cursors,
            statistics,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &PipelineRegistry<S> {
        &self.registry
    }

    pub fn log(&self) -> &DatapointLog<S> {
        &self.log
    }

    pub fn cursors(&self) -> &ConsumerCursors<S> {
        &self.cursors
    }

    pub fn statistics(&self) -> &StatisticsAggregator<S> {
        &self.statistics
    }
}
