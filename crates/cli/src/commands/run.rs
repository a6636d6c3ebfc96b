//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{StoreBackend, TurbineConfig};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::server::{Server, ServerConfig};

/// Execute the `run` command
pub async fn run_server(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let (mut config, from_file) = config_loader::ConfigLoader::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if !from_file {
        warn!(config = %args.config.display(), "Configuration file not found, using defaults");
    }

    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config).context("Invalid effective configuration")?;

    print_banner(&config);

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let server = Server::new(ServerConfig {
        turbine: config,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    let stats = server
        .run(shutdown_signal())
        .await
        .context("Server terminated with an error")?;

    info!(
        written = stats.ingestion.written,
        failed = stats.ingestion.failed,
        uptime_secs = stats.uptime.as_secs_f64(),
        "turbined stopped"
    );
    stats.print_summary();
    Ok(())
}

/// Apply CLI/env overrides on top of file values
fn apply_overrides(config: &mut TurbineConfig, args: &RunArgs) {
    if let Some(ref bind) = args.bind {
        info!(bind = %bind, "Overriding HTTP bind from CLI");
        config.server.bind = bind.clone();
    }
    if let Some(writers) = args.writers {
        info!(writers, "Overriding ingestion writers from CLI");
        config.ingestion.writers = writers;
    }
    if let Some(ref snapshot) = args.snapshot {
        info!(snapshot = %snapshot.display(), "Overriding snapshot path from CLI");
        config.store.snapshot_path = Some(snapshot.clone());
    }
    if let Some(ref url) = args.redis_url {
        info!(redis_url = %url, "Switching store to redis from CLI");
        config.store.backend = StoreBackend::Redis;
        config.store.redis_url = url.clone();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, draining ingestion queue...");
}

/// Print the startup banner with the effective configuration
fn print_banner(config: &TurbineConfig) {
    println!("\n=== Turbine {} ===\n", env!("CARGO_PKG_VERSION"));
    println!("Server:");
    println!("  Bind: {}", config.server.bind);
    println!("Store:");
    println!("  Backend: {:?}", config.store.backend);
    if config.store.backend == StoreBackend::Redis {
        println!("  Redis: {}", config.store.redis_url);
    } else {
        match &config.store.snapshot_path {
            Some(path) => println!(
                "  Snapshot: {} (every {}s)",
                path.display(),
                config.store.snapshot_interval_secs
            ),
            None => println!("  Snapshot: disabled"),
        }
    }
    println!("Ingestion:");
    println!("  Writers: {}", config.ingestion.writers);
    println!("  Queue capacity: {}", config.ingestion.queue_capacity);
    println!("  Max retries: {}", config.ingestion.max_retries);
    println!("Consumer:");
    println!(
        "  Batch limit: {} (max {})",
        config.consumer.batch_limit, config.consumer.max_batch_limit
    );
    println!("Statistics:");
    println!("  Window: {} days", config.statistics.window_days);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("turbine.toml"),
            bind: None,
            writers: None,
            snapshot: None,
            redis_url: None,
            dry_run: false,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = TurbineConfig::default();
        let args = RunArgs {
            bind: Some("127.0.0.1:9999".into()),
            writers: Some(3),
            snapshot: Some(PathBuf::from("/tmp/turbine.json")),
            ..args()
        };

        apply_overrides(&mut config, &args);

        assert_eq!(config.server.bind, "127.0.0.1:9999");
        assert_eq!(config.ingestion.writers, 3);
        assert_eq!(
            config.store.snapshot_path,
            Some(PathBuf::from("/tmp/turbine.json"))
        );
    }

    #[test]
    fn test_redis_url_selects_redis_backend() {
        let mut config = TurbineConfig::default();
        let args = RunArgs {
            redis_url: Some("tcp://10.0.0.5:6379".into()),
            ..args()
        };

        apply_overrides(&mut config, &args);

        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.redis_url, "tcp://10.0.0.5:6379");
        assert!(config_loader::ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = TurbineConfig::default();
        apply_overrides(&mut config, &args());
        assert_eq!(config, TurbineConfig::default());
    }
}
