//! # Ingestion Pipeline
//!
//! Datapoint ingestion module.
//!
//! Responsibilities:
//! - Admit datapoints onto a bounded queue, failing with `QueueFull` after a timeout
//! - Drain the queue with a fixed pool of supervised workers
//! - Per datapoint: provision the pipeline, allocate an offset, write, count intake
//! - Retry failed steps, report exhausted datapoints on a failure channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::IngestionPipeline;
//! use contracts::{Datapoint, IngestionConfig};
//!
//! let pipeline = IngestionPipeline::start(engine, IngestionConfig::default());
//! let failures = pipeline.take_failures().unwrap();
//!
//! pipeline.enqueue(Datapoint::new("p1", "hello")).await?;
//!
//! pipeline.shutdown().await;
//! while let Ok(failure) = failures.try_recv() {
//!     // Handle failed datapoint
//! }
//! ```

mod error;
mod metrics;
mod pipeline;
mod worker;

// Re-exports
pub use contracts::Datapoint;
pub use error::{IngestionError, IngestionFailure, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use pipeline::IngestionPipeline;

/// Receiver side of the failure report channel
pub type FailureReceiver = async_channel::Receiver<IngestionFailure>;
