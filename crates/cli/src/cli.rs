//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Turbine - persistent multi-consumer message queue
#[derive(Parser, Debug)]
#[command(
    name = "turbined",
    author,
    version,
    about = "Turbine message queue server",
    long_about = "A small message queue with append-only pipelines.\n\n\
                  Producers push datapoints over HTTP, a pool of writers appends them \n\
                  to per-pipeline logs, and every consumer pops with its own cursor."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TURBINE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TURBINE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ingestion workers and the HTTP server
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when it is absent
    #[arg(short, long, default_value = "turbine.toml", env = "TURBINE_CONFIG")]
    pub config: PathBuf,

    /// Override the HTTP bind address
    #[arg(long, env = "TURBINE_HTTP_BIND")]
    pub bind: Option<String>,

    /// Override the number of ingestion writers
    #[arg(long, env = "TURBINE_WRITERS")]
    pub writers: Option<usize>,

    /// Override the store snapshot file
    #[arg(long, env = "TURBINE_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Use the Redis backend at this URL, e.g. tcp://127.0.0.1:6379
    #[arg(long, env = "REDIS_PORT_6379_TCP")]
    pub redis_url: Option<String>,

    /// Validate configuration and exit without serving
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "TURBINE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "turbine.toml", env = "TURBINE_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "turbine.toml", env = "TURBINE_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
