//! Loading example and prediction files.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

use qacomp_core::Record;

/// Read records from a JSON array or a JSON Lines file.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_records(&content).with_context(|| format!("Invalid records in {}", path.display()))
}

pub fn parse_records(content: &str) -> Result<Vec<Record>> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let records: Vec<Record> =
            serde_json::from_str(trimmed).context("Expected a JSON array of objects")?;
        return Ok(records);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| -> Result<Record> {
            match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
                Ok(_) => bail!("line {}: expected a JSON object", n + 1),
                Err(e) => Err(e).with_context(|| format!("line {}", n + 1)),
            }
        })
        .collect()
}
