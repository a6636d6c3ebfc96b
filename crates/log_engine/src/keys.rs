//! Store key layout
//!
//! ```text
//! pipelines:{id}                          metadata (JSON)
//! pipeline:{id}:datapoints                offset counter (log head)
//! pipeline:{id}:datapoints:{offset}       datapoint payload
//! pipeline:{id}:firstdatapoint            retention boundary
//! pipeline:{id}:consumers                 consumer set
//! pipeline:{id}:consumers:{consumer}      consumer cursor
//! pipeline:{id}:statistics:{YYYY-MM-DD}   daily intake counter
//! ```

use chrono::NaiveDate;

/// Prefix shared by all metadata keys
pub const PIPELINES_PREFIX: &str = "pipelines:";

pub fn pipeline(id: &str) -> String {
    format!("{PIPELINES_PREFIX}{id}")
}

pub fn offset_counter(id: &str) -> String {
    format!("pipeline:{id}:datapoints")
}

pub fn datapoint(id: &str, offset: u64) -> String {
    format!("pipeline:{id}:datapoints:{offset}")
}

pub fn retention_boundary(id: &str) -> String {
    format!("pipeline:{id}:firstdatapoint")
}

pub fn consumer_set(id: &str) -> String {
    format!("pipeline:{id}:consumers")
}

pub fn cursor(id: &str, consumer: &str) -> String {
    format!("pipeline:{id}:consumers:{consumer}")
}

pub fn daily_intake(id: &str, date: NaiveDate) -> String {
    format!("pipeline:{id}:statistics:{}", date.format("%Y-%m-%d"))
}
