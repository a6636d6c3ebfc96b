//! # Contracts
//!
//! Shared interface contracts for the Turbine message queue.
//! Every business crate depends on this crate; the reverse is prohibited.
//!
//! ## Contents
//! - Pipeline, consumer and statistic records exchanged with the API layer
//! - The `KvStore` adapter trait the log engine is written against
//! - `TurbineConfig`, the deserialized configuration tree
//! - The unified `ContractError` taxonomy

mod config;
mod datapoint;
mod error;
mod identifier;
mod pipeline;
mod store;

pub use config::*;
pub use datapoint::Datapoint;
pub use error::*;
pub use identifier::{ensure_identifier, validate_identifier, MAX_IDENTIFIER_LEN};
pub use pipeline::*;
pub use store::{KvStore, LocalKvStore};
