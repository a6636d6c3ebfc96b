//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{StoreBackend, TurbineConfig};
use tracing::info;

use crate::cli::InfoArgs;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let (config, from_file) = config_loader::ConfigLoader::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = config_loader::ConfigLoader::to_json(&config)
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        let source = if from_file {
            args.config.display().to_string()
        } else {
            "built-in defaults".to_string()
        };
        print_config_info(&config, &source);
    }

    Ok(())
}

fn print_config_info(config: &TurbineConfig, source: &str) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Turbine Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Source: {}\n", source);

    println!("🌐 Server");
    println!("   └─ Bind: {}", config.server.bind);

    println!("\n💾 Store");
    println!("   ├─ Backend: {:?}", config.store.backend);
    match &config.store.snapshot_path {
        _ if config.store.backend == StoreBackend::Redis => {
            println!("   └─ Redis: {}", config.store.redis_url);
        }
        Some(path) => {
            println!("   ├─ Snapshot: {}", path.display());
            println!("   └─ Interval: {}s", config.store.snapshot_interval_secs);
        }
        None => println!("   └─ Snapshot: disabled"),
    }

    let ingestion = &config.ingestion;
    println!("\n📥 Ingestion");
    println!("   ├─ Writers: {}", ingestion.writers);
    println!("   ├─ Queue capacity: {}", ingestion.queue_capacity);
    println!("   ├─ Enqueue timeout: {}ms", ingestion.enqueue_timeout_ms);
    println!(
        "   ├─ Retries: {} (backoff {}ms)",
        ingestion.max_retries, ingestion.retry_backoff_ms
    );
    println!("   ├─ Restart backoff: {}ms", ingestion.restart_backoff_ms);
    println!("   └─ Failure capacity: {}", ingestion.failure_capacity);

    println!("\n📤 Consumer");
    println!("   ├─ Batch limit: {}", config.consumer.batch_limit);
    println!("   └─ Max batch limit: {}", config.consumer.max_batch_limit);

    println!("\n📈 Statistics");
    println!("   └─ Window: {} days", config.statistics.window_days);

    println!();
}
