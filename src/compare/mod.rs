//! Snapshot comparison: three independent anomaly checks over a baseline
//! and a current snapshot, producing severity-tagged alerts.
//!
//! Pure functions of their inputs; no state is kept between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::CompareConfig;
use crate::scanner::snapshot::{Snapshot, round4};

/// Alert severity, a total order: `Ok < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Ok,
    High,
    Critical,
}

impl Severity {
    /// Process exit code for operator tooling: 0 OK, 1 HIGH, 2 CRITICAL.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::High => 1,
            Self::Critical => 2,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Which anomaly check fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    EntropySpike,
    MassEncryption,
    ExtensionEntropyShift,
}

/// One emitted anomaly. Numeric fields are signal-specific and omitted
/// from the serialized form when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub severity: Severity,
    pub signal: Signal,
    pub message: String,
    /// Entropy delta in bits/byte (spike and extension-shift signals).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    /// Affected extension (extension-shift signal).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Newly very-high files (mass-encryption signal).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_suspicious_count: Option<i64>,
}

/// Outcome of comparing two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonReport {
    /// Capture time of the current snapshot.
    pub timestamp: DateTime<Utc>,
    /// Capture time of the baseline snapshot.
    pub baseline_time: DateTime<Utc>,
    pub alerts: Vec<Alert>,
    /// Maximum severity among the alerts; `OK` when none fired.
    pub severity: Severity,
    /// Global average entropy delta, always reported, rounded to 4 decimals.
    pub entropy_delta: f64,
}

/// Compare a baseline snapshot against a current one.
///
/// The three checks are independent; a single call can yield zero, one, or
/// several alerts. Comparing snapshots of different roots is permitted and
/// left to the caller's judgment.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compare(baseline: &Snapshot, current: &Snapshot, config: &CompareConfig) -> ComparisonReport {
    let mut alerts = Vec::new();

    // Check 1: global entropy spike.
    let ent_delta = current.avg_entropy - baseline.avg_entropy;
    if ent_delta > config.spike_threshold {
        alerts.push(Alert {
            severity: Severity::Critical,
            signal: Signal::EntropySpike,
            message: format!(
                "average entropy jumped {ent_delta:+.2} bits/byte ({:.2} -> {:.2})",
                baseline.avg_entropy, current.avg_entropy
            ),
            delta: Some(ent_delta),
            extension: None,
            new_suspicious_count: None,
        });
    }

    // Check 2: mass encryption. The percentage is relative to the *baseline*
    // file count, so adding encrypted copies without deleting originals
    // still trips the threshold. Signed arithmetic keeps a shrinking
    // very-high count from alerting. Denominator floored at 1: a zero-file
    // baseline is a legitimate degenerate case, not an error.
    let vh_delta = i64::try_from(current.very_high_count).unwrap_or(i64::MAX)
        - i64::try_from(baseline.very_high_count).unwrap_or(i64::MAX);
    let vh_pct = vh_delta as f64 / baseline.total_files.max(1) as f64 * 100.0;
    if vh_pct > config.mass_encryption_pct {
        alerts.push(Alert {
            severity: Severity::Critical,
            signal: Signal::MassEncryption,
            message: format!(
                "{vh_delta} new files above the very-high entropy threshold \
                 ({vh_pct:.0}% of baseline files)"
            ),
            delta: None,
            extension: None,
            new_suspicious_count: Some(vh_delta),
        });
    }

    // Check 3: per-extension shift, intersection of the extension maps only.
    // Extensions present in just one snapshot are silently skipped; formats
    // expected to be high entropy already are exempt.
    for (ext, cur_stats) in &current.by_extension {
        let Some(base_stats) = baseline.by_extension.get(ext) else {
            continue;
        };
        let ext_delta = cur_stats.avg_entropy - base_stats.avg_entropy;
        if ext_delta > config.spike_threshold && !config.excluded_extensions.contains(ext) {
            alerts.push(Alert {
                severity: Severity::High,
                signal: Signal::ExtensionEntropyShift,
                message: format!(
                    "{ext} files entropy jumped {ext_delta:+.2} ({:.2} -> {:.2})",
                    base_stats.avg_entropy, cur_stats.avg_entropy
                ),
                delta: Some(ext_delta),
                extension: Some(ext.clone()),
                new_suspicious_count: None,
            });
        }
    }

    let severity = alerts
        .iter()
        .map(|a| a.severity)
        .max()
        .unwrap_or(Severity::Ok);

    ComparisonReport {
        timestamp: current.timestamp,
        baseline_time: baseline.timestamp,
        alerts,
        severity,
        entropy_delta: round4(ent_delta),
    }
}
