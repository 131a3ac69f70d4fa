//! Source file loading.
//!
//! Source files are JSON arrays of records written by the scrapers. A file
//! that is missing, unreadable, malformed, or not an array contributes no
//! records; the problem is logged and the run continues.

use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Read the records of one source file.
pub fn load_records(path: &Path) -> Vec<Value> {
    if !path.exists() {
        warn!(path = %path.display(), "source file not found, skipping");
        return Vec::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read source file");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(records)) => {
            debug!(path = %path.display(), records = records.len(), "loaded source file");
            records
        }
        Ok(_) => {
            warn!(path = %path.display(), "source file is not a JSON array, skipping");
            Vec::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid JSON in source file");
            Vec::new()
        }
    }
}
