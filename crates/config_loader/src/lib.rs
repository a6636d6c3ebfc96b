//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce `TurbineConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("turbine.toml")).unwrap();
//! println!("Bind: {}", config.server.bind);
//! ```

mod parser;
mod validator;

pub use contracts::TurbineConfig;
pub use parser::ConfigFormat;
pub use validator::MAX_WINDOW_DAYS;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<TurbineConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    ///
    /// # Returns
    /// The configuration and whether it came from the file
    pub fn load_or_default(path: &Path) -> Result<(TurbineConfig, bool), ContractError> {
        if path.exists() {
            Ok((Self::load_from_path(path)?, true))
        } else {
            Ok((TurbineConfig::default(), false))
        }
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<TurbineConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already built configuration (e.g. after CLI overrides)
    pub fn validate(config: &TurbineConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize TurbineConfig to TOML string
    pub fn to_toml(config: &TurbineConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize TurbineConfig to JSON string
    pub fn to_json(config: &TurbineConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<TurbineConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TOML: &str = r#"
[server]
bind = "0.0.0.0:3000"

[store]
backend = "memory"
snapshot_path = "turbine.snapshot.json"
snapshot_interval_secs = 30

[ingestion]
writers = 100
queue_capacity = 1024
enqueue_timeout_ms = 1000
max_retries = 3
retry_backoff_ms = 50
restart_backoff_ms = 500
failure_capacity = 1024

[consumer]
batch_limit = 10
max_batch_limit = 1000

[statistics]
window_days = 10
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(FULL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert_eq!(result.unwrap().ingestion.writers, 100);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        assert_eq!(config, TurbineConfig::default());
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(FULL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let reloaded = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config, reloaded);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(FULL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config, reloaded);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let result = ConfigLoader::load_from_str(
            "[consumer]\nbatch_limit = 0\n",
            ConfigFormat::Toml,
        );
        assert!(matches!(
            result,
            Err(ContractError::ConfigValidation { ref field, .. }) if field == "consumer.batch_limit"
        ));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turbine.json");
        std::fs::write(&path, r#"{"ingestion":{"writers":7}}"#).unwrap();
        assert_eq!(ConfigLoader::load_from_path(&path).unwrap().ingestion.writers, 7);

        let yaml = dir.path().join("turbine.yaml");
        std::fs::write(&yaml, "writers: 7").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_path(&yaml),
            Err(ContractError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (config, from_file) =
            ConfigLoader::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(!from_file);
        assert_eq!(config, TurbineConfig::default());
    }
}
