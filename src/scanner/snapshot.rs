//! Snapshot data model: a point-in-time aggregate entropy profile of a tree.
//!
//! A [`Snapshot`] is immutable once built and is the sole unit of comparison.
//! Aggregation happens through [`SnapshotBuilder`], which a single reducer
//! thread feeds with per-file readings; finalization rounds the running
//! averages to four decimal places.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::SamplerConfig;
use crate::core::errors::Result;

/// Round to four decimal places, the precision carried by persisted snapshots.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// A file retained in the snapshot because it crossed the very-high
/// entropy threshold. Only these files are kept, to bound memory on
/// large trees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Entropy in bits/byte, rounded to 4 decimals.
    pub entropy: f64,
    pub size: u64,
    /// Lowercase extension including the dot; empty for extensionless files.
    pub ext: String,
}

/// Finalized per-extension aggregate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExtensionStats {
    pub count: u64,
    /// Average entropy across the extension's files, rounded to 4 decimals.
    pub avg_entropy: f64,
}

/// Aggregate entropy profile of one scan of one root path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// Root path the scan covered.
    pub path: PathBuf,
    /// Capture time in UTC; provenance metadata, not a comparison input.
    pub timestamp: DateTime<Utc>,
    /// Files that produced a valid reading and passed the size floor.
    pub total_files: u64,
    /// Mean entropy over all counted files, `0.0` when none (never NaN).
    pub avg_entropy: f64,
    /// Files above the high-entropy threshold (default 7.5 bits/byte).
    pub high_entropy_count: u64,
    /// Files above the very-high threshold (default 7.9 bits/byte).
    pub very_high_count: u64,
    /// Per-extension aggregates keyed by lowercase extension (`""` for none).
    pub by_extension: BTreeMap<String, ExtensionStats>,
    /// Very-high entropy files in discovery order, not sorted by entropy.
    pub suspicious: Vec<FileRecord>,
}

impl Snapshot {
    /// Serialize to the persisted JSON document form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot back from its JSON document form.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Internal per-extension accumulator; finalized into [`ExtensionStats`].
#[derive(Debug, Clone, Copy, Default)]
struct ExtAccumulator {
    count: u64,
    total_entropy: f64,
}

/// Incremental snapshot accumulator.
///
/// Accumulation order follows reducer arrival order. With a parallel walk
/// that order varies run to run; the final rounded aggregates are stable
/// apart from floating-point summation order, which the rounding tolerance
/// absorbs in practice.
#[derive(Debug)]
pub struct SnapshotBuilder {
    root: PathBuf,
    high_threshold: f64,
    very_high_threshold: f64,
    total_files: u64,
    entropy_sum: f64,
    high_entropy_count: u64,
    very_high_count: u64,
    by_extension: BTreeMap<String, ExtAccumulator>,
    suspicious: Vec<FileRecord>,
}

impl SnapshotBuilder {
    #[must_use]
    pub fn new(root: &Path, sampler: &SamplerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            high_threshold: sampler.high_threshold,
            very_high_threshold: sampler.very_high_threshold,
            total_files: 0,
            entropy_sum: 0.0,
            high_entropy_count: 0,
            very_high_count: 0,
            by_extension: BTreeMap::new(),
            suspicious: Vec::new(),
        }
    }

    /// Fold one valid file reading into the aggregates.
    pub fn record(&mut self, path: PathBuf, entropy: f64, size: u64, ext: &str) {
        self.total_files += 1;
        self.entropy_sum += entropy;

        if entropy > self.high_threshold {
            self.high_entropy_count += 1;
        }
        if entropy > self.very_high_threshold {
            self.very_high_count += 1;
            self.suspicious.push(FileRecord {
                path,
                entropy: round4(entropy),
                size,
                ext: ext.to_string(),
            });
        }

        let acc = self.by_extension.entry(ext.to_string()).or_default();
        acc.count += 1;
        acc.total_entropy += entropy;
    }

    /// Number of files recorded so far.
    #[must_use]
    pub const fn total_files(&self) -> u64 {
        self.total_files
    }

    /// Finalize into an immutable snapshot, stamping the capture time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(self) -> Snapshot {
        let avg_entropy = if self.total_files > 0 {
            round4(self.entropy_sum / self.total_files as f64)
        } else {
            0.0
        };

        let by_extension = self
            .by_extension
            .into_iter()
            .map(|(ext, acc)| {
                (
                    ext,
                    ExtensionStats {
                        count: acc.count,
                        avg_entropy: round4(acc.total_entropy / acc.count as f64),
                    },
                )
            })
            .collect();

        Snapshot {
            path: self.root,
            timestamp: Utc::now(),
            total_files: self.total_files,
            avg_entropy,
            high_entropy_count: self.high_entropy_count,
            very_high_count: self.very_high_count,
            by_extension,
            suspicious: self.suspicious,
        }
    }
}

/// Lowercase extension of a file name, dot included; `""` when absent.
#[must_use]
pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
