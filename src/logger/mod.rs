//! JSONL activity log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object, assembled in memory and
//! written with a single `write_all` so a tailing process never sees a
//! partial line. Logging must never fail the scan: on write failure the
//! writer degrades to stderr, then to silent discard.

#![allow(missing_docs)]

use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Critical,
}

/// Event types matching the esn activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ScanComplete,
    BaselineSaved,
    CompareComplete,
    Alert,
    Error,
}

/// A single JSONL entry — all fields optional except `ts`, `event`, `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub level: Level,
    /// Scan root involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_files: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_entropy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub very_high_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// FNV-1a hash of the effective config, so log lines from different
    /// threshold settings are distinguishable after the fact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    /// Signal name for alert events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// Report severity label for compare events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, level: Level) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            level,
            root: None,
            total_files: None,
            avg_entropy: None,
            very_high_count: None,
            duration_ms: None,
            config_hash: None,
            signal: None,
            severity: None,
            error_code: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with a two-step degradation chain.
pub struct JsonlWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    state: WriterState,
}

impl JsonlWriter {
    /// Open the log file, creating parent directories as needed.
    /// Falls back to stderr when the path is unusable.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        match open_append(&path) {
            Ok(file) => Self {
                path,
                writer: Some(BufWriter::with_capacity(64 * 1024, file)),
                state: WriterState::Normal,
            },
            Err(_) => {
                let _ = writeln!(
                    io::stderr(),
                    "[ESN-JSONL] log path unusable, using stderr: {}",
                    path.display()
                );
                Self {
                    path,
                    writer: None,
                    state: WriterState::Stderr,
                }
            }
        }
    }

    /// Write a single log entry as one atomic JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[ESN-JSONL] serialize error: {e}");
                return;
            }
        };

        match self.state {
            WriterState::Normal => {
                let failed = self
                    .writer
                    .as_mut()
                    .is_none_or(|w| w.write_all(line.as_bytes()).is_err());
                if failed {
                    self.writer = None;
                    self.state = WriterState::Stderr;
                    let _ = write!(io::stderr(), "[ESN-JSONL] {line}");
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[ESN-JSONL] {line}").is_err() {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state, for diagnostics.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// The configured primary path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

fn open_append(path: &std::path::Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
