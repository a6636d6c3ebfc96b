//! Pipeline records
//!
//! Metadata owned by the pipeline registry plus the hydrated views
//! (statistic, consumers) attached on read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A named channel datapoints are pushed to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Pipeline {
    /// Unique id; generated on create when empty
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    #[validate(length(max = 256, message = "name must be at most 256 characters"))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 4096, message = "description must be at most 4096 characters"))]
    pub description: String,

    /// Intake statistic, computed on read
    #[serde(default)]
    pub statistic: PipelineStatistic,

    /// Registered consumers with their backlog, computed on read
    #[serde(default)]
    pub consumers: Vec<Consumer>,
}

impl Pipeline {
    /// Create a pipeline with the given id and name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Metadata-only copy, as persisted by the registry
    pub fn metadata(&self) -> PipelineMetadata {
        PipelineMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// Persisted part of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl PipelineMetadata {
    /// Minimal record for a pipeline provisioned by its first push
    pub fn provisioned(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
        }
    }

    /// Expand into a pipeline with empty hydrated views
    pub fn into_pipeline(self) -> Pipeline {
        Pipeline {
            id: self.id,
            name: self.name,
            description: self.description,
            ..Default::default()
        }
    }
}

/// Partial update of a pipeline; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PipelinePatch {
    #[serde(default)]
    #[validate(length(max = 256, message = "name must be at most 256 characters"))]
    pub name: Option<String>,

    #[serde(default)]
    #[validate(length(max = 4096, message = "description must be at most 4096 characters"))]
    pub description: Option<String>,
}

impl PipelinePatch {
    /// Apply to stored metadata
    pub fn apply(&self, metadata: &mut PipelineMetadata) {
        if let Some(name) = &self.name {
            metadata.name = name.clone();
        }
        if let Some(description) = &self.description {
            metadata.description = description.clone();
        }
    }
}

/// A consumer registered on a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: String,
    /// Offsets between the consumer's cursor and the log head
    pub unread_elements: u64,
}

/// Intake statistic of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStatistic {
    /// Datapoints ingested on the current UTC day
    pub today: u64,

    /// Day-over-day change in percent; 0.0 when yesterday saw no intake
    pub change_rate: f64,

    /// Trailing window, most recent day first
    pub statistics: Vec<PipelineStatisticElement>,
}

/// Intake of a single day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatisticElement {
    /// Calendar day, serialized as `YYYY-MM-DD`
    pub date: NaiveDate,
    pub intake: u64,
}
