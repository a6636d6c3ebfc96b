//! Layered error definitions
//!
//! Categorized by source: store / engine / config

use thiserror::Error;

/// Error raised by a `KvStore` backend
///
/// The adapter never retries; callers decide.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Store cannot be reached (connection refused, lock poisoned, ...)
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// Stored value has the wrong shape for the requested operation
    #[error("malformed value at '{key}': {message}")]
    Malformed { key: String, message: String },
}

impl StoreError {
    /// Create unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create malformed value error
    pub fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this is a connectivity failure
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Whether a stored value had the wrong shape
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Engine Errors =====
    /// Referenced record does not exist
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Store unreachable or returned malformed data
    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Ingestion queue saturated
    #[error("ingestion queue busy for pipeline '{pipeline_id}': waited {waited_ms}ms")]
    Busy { pipeline_id: String, waited_ms: u64 },

    /// Malformed input
    #[error("validation error at '{field}': {message}")]
    Validation { field: String, message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create pipeline not found error
    pub fn pipeline_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "pipeline",
            id: id.into(),
        }
    }

    /// Create storage error without an underlying source
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the error originates from a store connectivity failure
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Self::Storage {
                source: Some(source),
                ..
            } => source
                .downcast_ref::<StoreError>()
                .is_some_and(StoreError::is_unavailable),
            _ => false,
        }
    }

    /// Whether the error comes from malformed stored data; retrying cannot help
    pub fn is_store_malformed(&self) -> bool {
        match self {
            Self::Storage {
                source: Some(source),
                ..
            } => source
                .downcast_ref::<StoreError>()
                .is_some_and(StoreError::is_malformed),
            _ => false,
        }
    }
}

impl From<StoreError> for ContractError {
    fn from(err: StoreError) -> Self {
        Self::Storage {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<validator::ValidationErrors> for ContractError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), |m| m.to_string())
                    })
                    .unwrap_or_default();
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("input".to_string(), errors.to_string()));
        Self::Validation { field, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts_to_storage() {
        let err: ContractError = StoreError::unavailable("connection refused").into();
        assert!(matches!(err, ContractError::Storage { .. }));
        assert!(err.is_store_unavailable());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_malformed_is_not_unavailable() {
        let err: ContractError = StoreError::malformed("k", "not an integer").into();
        assert!(!err.is_store_unavailable());
        assert!(err.is_store_malformed());
        assert!(!ContractError::storage("decode").is_store_unavailable());
        assert!(!ContractError::storage("decode").is_store_malformed());
    }

    #[test]
    fn test_not_found_message() {
        let err = ContractError::pipeline_not_found("p1");
        assert_eq!(err.to_string(), "pipeline not found: p1");
    }
}
