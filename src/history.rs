//! History tuple for finished conversions.
//!
//! The engine only derives the `{path, format, byte_size, timestamp}` tuple;
//! storing it is up to the caller. The CLI appends one JSON object per line
//! to the file given with `--history-log`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::ItemSummary;
use crate::imaging::Codec;
use crate::types::ConversionOutput;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Written file, or the source label for in-memory outputs.
    pub path: String,
    pub format: Codec,
    pub byte_size: u64,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_output(output: &ConversionOutput, fallback_label: &str) -> Self {
        Self::from_summary(&ItemSummary::from(output), fallback_label)
    }

    pub fn from_summary(summary: &ItemSummary, fallback_label: &str) -> Self {
        Self::at(summary, fallback_label, Utc::now())
    }

    pub fn at(summary: &ItemSummary, fallback_label: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            path: summary
                .destination
                .clone()
                .unwrap_or_else(|| fallback_label.to_string()),
            format: summary.codec,
            byte_size: summary.byte_size,
            timestamp,
        }
    }

    pub fn to_json_line(&self) -> Result<String, HistoryError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Append entries to a JSON-lines log, creating it if needed.
pub fn append_history(path: &Path, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
    if entries.is_empty() {
        return Ok(());
    }
    let mut lines = String::new();
    for entry in entries {
        lines.push_str(&entry.to_json_line()?);
        lines.push('\n');
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(lines.as_bytes())?;
    Ok(())
}
