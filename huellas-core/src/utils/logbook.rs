// huellas-core/src/utils/logbook.rs
//! Append-only JSONL audit trail (`logbook.jsonl` under the root).
//!
//! Quota usage and swallowed persistence failures land here so a support
//! session can reconstruct what the device did while offline.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Serialize)]
struct LogLine<'a> {
    ts: String,
    event: &'a str,
    data: &'a Value,
}

/// Cheap to clone; every append reopens the file in append mode.
#[derive(Debug, Clone)]
pub struct Logbook {
    path: PathBuf,
}

impl Logbook {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create_dir_all({:?})", parent))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn emit(&self, event: &str, data: Value) -> Result<()> {
        let line = LogLine {
            ts: Utc::now().to_rfc3339(),
            event,
            data: &data,
        };
        let json = serde_json::to_string(&line)?;
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open logbook {:?}", self.path))?;
        writeln!(f, "{}", json)?;
        Ok(())
    }

    /// Best effort: audit failures must never fail the caller.
    pub fn record(&self, event: &str, data: Value) {
        if let Err(e) = self.emit(event, data) {
            tracing::warn!(error = %e, event, "logbook append failed");
        }
    }

    /// Parsed lines, oldest first. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read logbook {:?}", self.path))?;
        Ok(text
            .lines()
            .filter_map(|l| serde_json::from_str::<Value>(l).ok())
            .collect())
    }
}
