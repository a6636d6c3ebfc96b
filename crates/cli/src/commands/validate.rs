//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{StoreBackend, TurbineConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    bind: String,
    writers: usize,
    queue_capacity: usize,
    batch_limit: usize,
    window_days: u32,
    persistent: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    bind: config.server.bind.clone(),
                    writers: config.ingestion.writers,
                    queue_capacity: config.ingestion.queue_capacity,
                    batch_limit: config.consumer.batch_limit,
                    window_days: config.statistics.window_days,
                    persistent: config.store.backend == StoreBackend::Redis
                        || config.store.snapshot_path.is_some(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &TurbineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    match config.store.backend {
        StoreBackend::Memory if config.store.snapshot_path.is_none() => {
            warnings.push("store.snapshot_path is not set - data is lost on restart".to_string());
        }
        StoreBackend::Redis if config.store.snapshot_path.is_some() => {
            warnings.push("store.snapshot_path is ignored by the redis backend".to_string());
        }
        _ => {}
    }

    if config.ingestion.queue_capacity < config.ingestion.writers {
        warnings.push(format!(
            "ingestion.queue_capacity ({}) is smaller than ingestion.writers ({})",
            config.ingestion.queue_capacity, config.ingestion.writers
        ));
    }

    if config.ingestion.max_retries == 0 {
        warnings.push("ingestion.max_retries is 0 - transient store errors are not retried".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Bind: {}", summary.bind);
            println!("  Writers: {}", summary.writers);
            println!("  Queue capacity: {}", summary.queue_capacity);
            println!("  Batch limit: {}", summary.batch_limit);
            println!("  Statistics window: {} days", summary.window_days);
            println!("  Persistent: {}", summary.persistent);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
