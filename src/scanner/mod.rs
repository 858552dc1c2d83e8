//! Tree aggregation: walk a root path, sample eligible files, and fold the
//! readings into an immutable [`snapshot::Snapshot`].

pub mod snapshot;
pub mod walker;

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::core::config::Config;
use crate::core::errors::{EsnError, Result};
use crate::scanner::snapshot::{Snapshot, SnapshotBuilder};
use crate::scanner::walker::{TreeWalker, WalkStats, WalkerConfig};

/// Scan a directory tree into a snapshot.
///
/// `extension_filter`, when supplied, scopes the scan to those extensions
/// (matched lowercase, leading dot added if missing). A missing or non-
/// directory root is a hard error; per-file failures are soft skips.
pub fn scan(
    root: &Path,
    config: &Config,
    extension_filter: Option<&HashSet<String>>,
) -> Result<Snapshot> {
    scan_with_stats(root, config, extension_filter, None).map(|(snap, _)| snap)
}

/// Like [`scan`], but cooperatively cancellable.
///
/// When `cancel` flips true, no new file reads are dispatched; in-flight
/// reads may complete. The partial snapshot is discarded and
/// [`EsnError::Cancelled`] returned — a partial snapshot is never presented
/// as a complete one.
pub fn scan_with_cancel(
    root: &Path,
    config: &Config,
    extension_filter: Option<&HashSet<String>>,
    cancel: Arc<AtomicBool>,
) -> Result<Snapshot> {
    scan_with_stats(root, config, extension_filter, Some(cancel)).map(|(snap, _)| snap)
}

/// Full-fidelity entry point: snapshot plus the walk's soft-skip counters.
pub fn scan_with_stats(
    root: &Path,
    config: &Config,
    extension_filter: Option<&HashSet<String>>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<(Snapshot, WalkStats)> {
    let meta = fs::metadata(root).map_err(|source| EsnError::InvalidRoot {
        path: root.to_path_buf(),
        details: source.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(EsnError::InvalidRoot {
            path: root.to_path_buf(),
            details: "not a directory".to_string(),
        });
    }

    let walker_config = WalkerConfig {
        root: root.to_path_buf(),
        max_depth: config.scanner.max_depth,
        parallelism: config.scanner.parallelism,
        follow_symlinks: config.scanner.follow_symlinks,
        excluded_dir_names: config.scanner.excluded_dir_names.iter().cloned().collect(),
        min_file_size: config.sampler.min_file_size,
        sample_bytes: config.sampler.sample_bytes,
        extension_filter: extension_filter.map(|set| {
            set.iter()
                .map(|ext| {
                    let lowered = ext.to_lowercase();
                    if lowered.starts_with('.') {
                        lowered
                    } else {
                        format!(".{lowered}")
                    }
                })
                .collect()
        }),
    };

    let mut walker = TreeWalker::new(walker_config);
    if let Some(flag) = cancel {
        walker = walker.with_cancel(flag);
    }

    // Single-reducer accumulation: workers sample in parallel, this thread
    // owns the builder, so no locking around the aggregates.
    let mut builder = SnapshotBuilder::new(root, &config.sampler);
    for sample in walker.stream() {
        builder.record(sample.path, sample.entropy, sample.size, &sample.ext);
    }

    if walker.is_cancelled() {
        return Err(EsnError::Cancelled);
    }

    Ok((builder.build(), walker.stats()))
}
