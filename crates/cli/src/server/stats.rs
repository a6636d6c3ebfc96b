//! Server run statistics.

use std::time::Duration;

use broker::MetricsSnapshot;

/// Statistics from a server run
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Wall time between start and the final snapshot
    pub uptime: Duration,

    /// Ingestion counters at shutdown
    pub ingestion: MetricsSnapshot,

    /// Keys held by the in-memory store at shutdown (None = external store)
    pub store_keys: Option<usize>,

    /// Keys written by the final snapshot (None = persistence disabled)
    pub snapshot_keys: Option<usize>,
}

impl ServerStats {
    /// Datapoints written per second of uptime
    pub fn write_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.ingestion.written as f64 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Server Statistics ===\n");
        println!("Uptime: {:.2}s", self.uptime.as_secs_f64());
        println!("Write rate: {:.2}/s", self.write_rate());
        if let Some(keys) = self.store_keys {
            println!("Store keys: {}", keys);
        }
        match self.snapshot_keys {
            Some(keys) => println!("Snapshot: {} keys", keys),
            None => println!("Snapshot: disabled"),
        }
        println!("\n{}\n", self.ingestion);
    }
}
