//! Datapoint - unit of work handed from producers to the ingestion workers

use bytes::Bytes;

/// A value pushed to a pipeline, not yet assigned an offset
///
/// The payload is opaque; it is stored byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datapoint {
    /// Target pipeline
    pub pipeline_id: String,

    /// Opaque payload
    pub payload: Bytes,
}

impl Datapoint {
    /// Create a new datapoint
    pub fn new(pipeline_id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            payload: payload.into(),
        }
    }
}
