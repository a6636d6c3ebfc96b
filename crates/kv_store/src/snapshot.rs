//! Snapshot file format
//!
//! `{"version":1,"entries":{"<key>":{"type":"bytes","value":[..]}}}`, written to a
//! temporary sibling and renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::memory::Value;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: BTreeMap<String, Value>,
}

/// Read a snapshot; `None` when the file does not exist
pub(crate) fn read(path: &Path) -> io::Result<Option<BTreeMap<String, Value>>> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let snapshot: Snapshot = serde_json::from_slice(&content)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported snapshot version {}", snapshot.version),
        ));
    }
    Ok(Some(snapshot.entries))
}

/// Write a snapshot atomically
pub(crate) fn write(path: &Path, entries: &BTreeMap<String, Value>) -> io::Result<()> {
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        entries,
    };
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
    fs::rename(&tmp, path)
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    entries: &'a BTreeMap<String, Value>,
}
