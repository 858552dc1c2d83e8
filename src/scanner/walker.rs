//! Parallel directory walker feeding the snapshot aggregator.
//!
//! The walker discovers eligible files, samples each one's entropy in a
//! bounded worker pool, and streams [`FileSample`] results to a single
//! reducer. Directory pruning (dot-prefixed names plus the configured
//! deny-list) happens at dispatch time, so excluded subtrees are never
//! entered at all.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;

use crate::entropy::{self, EntropyReading};
use crate::scanner::snapshot::lowercase_extension;

/// Walker configuration derived from the scanner and sampler sections of
/// the global config.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub root: PathBuf,
    pub max_depth: usize,
    pub parallelism: usize,
    pub follow_symlinks: bool,
    /// Directory names pruned from traversal (the dot-prefix rule is built in).
    pub excluded_dir_names: HashSet<String>,
    /// Files strictly smaller than this are never sampled.
    pub min_file_size: u64,
    /// Prefix sample cap per file.
    pub sample_bytes: usize,
    /// When set, only files whose lowercase extension is in the set are
    /// sampled. Keys carry the leading dot, e.g. `.docx`.
    pub extension_filter: Option<HashSet<String>>,
}

/// One sampled file, emitted to the reducer.
#[derive(Debug, Clone)]
pub struct FileSample {
    pub path: PathBuf,
    pub entropy: f64,
    pub size: u64,
    pub ext: String,
}

/// Soft-skip accounting for one walk. Per-file failures never become errors;
/// these counters make them observable in logs and verbose output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub files_seen: u64,
    pub files_sampled: u64,
    pub skipped_small: u64,
    pub skipped_filtered: u64,
    pub unstatable: u64,
    pub unreadable: u64,
    pub dirs_pruned: u64,
}

/// Item in the internal work queue: (directory_path, depth).
type WorkItem = (PathBuf, usize);

/// Parallel walker over one root path.
///
/// Traversal order is unspecified; callers must only rely on aggregate
/// counts. Cancellation stops dispatching new directories and file reads
/// while letting in-flight work finish.
pub struct TreeWalker {
    config: WalkerConfig,
    stats: Arc<parking_lot::Mutex<WalkStats>>,
    cancel: Arc<AtomicBool>,
}

impl TreeWalker {
    #[must_use]
    pub fn new(config: WalkerConfig) -> Self {
        Self {
            config,
            stats: Arc::new(parking_lot::Mutex::new(WalkStats::default())),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a caller-owned cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether the walk was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Snapshot of the skip counters. Complete once the result channel has
    /// been drained.
    #[must_use]
    pub fn stats(&self) -> WalkStats {
        self.stats.lock().clone()
    }

    /// Stream file samples as workers produce them.
    ///
    /// The walk runs in background threads; the returned receiver closes
    /// when every worker has drained the work queue.
    #[must_use]
    pub fn stream(&self) -> channel::Receiver<FileSample> {
        let parallelism = self.config.parallelism.max(1);

        // Work items bounded to keep memory flat on wide trees; results
        // unbounded so workers never stall on a slow reducer.
        let (work_tx, work_rx) = channel::bounded::<WorkItem>(4096);
        let (result_tx, result_rx) = channel::unbounded::<FileSample>();

        // Track in-flight directories so workers know when to stop.
        let in_flight = Arc::new(AtomicUsize::new(0));

        in_flight.fetch_add(1, Ordering::Release);
        let _ = work_tx.send((self.config.root.clone(), 0));

        for _ in 0..parallelism {
            let work_rx = work_rx.clone();
            let work_tx = work_tx.clone();
            let result_tx = result_tx.clone();
            let in_flight = Arc::clone(&in_flight);
            let config = self.config.clone();
            let stats = Arc::clone(&self.stats);
            let cancel = Arc::clone(&self.cancel);

            thread::spawn(move || {
                walker_thread(&work_rx, &work_tx, &result_tx, &in_flight, &config, &stats, &cancel);
            });
        }

        result_rx
    }
}

/// Worker loop: pull directories, process them, push results and subdirs.
fn walker_thread(
    work_rx: &channel::Receiver<WorkItem>,
    work_tx: &channel::Sender<WorkItem>,
    result_tx: &channel::Sender<FileSample>,
    in_flight: &AtomicUsize,
    config: &WalkerConfig,
    stats: &parking_lot::Mutex<WalkStats>,
    cancel: &AtomicBool,
) {
    loop {
        match work_rx.recv_timeout(Duration::from_millis(50)) {
            Ok((dir_path, depth)) => {
                if !cancel.load(Ordering::Acquire) {
                    process_directory(
                        &dir_path, depth, work_tx, result_tx, in_flight, config, stats, cancel,
                    );
                }
                in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            Err(channel::RecvTimeoutError::Timeout) => {
                if in_flight.load(Ordering::Acquire) == 0 {
                    return;
                }
            }
            Err(channel::RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Whether a directory name is pruned from traversal.
fn is_pruned_dir(name: &str, excluded: &HashSet<String>) -> bool {
    name.starts_with('.') || excluded.contains(name)
}

/// Process one directory: sample eligible files, enqueue eligible subdirs.
#[allow(clippy::too_many_arguments)]
fn process_directory(
    dir_path: &Path,
    depth: usize,
    work_tx: &channel::Sender<WorkItem>,
    result_tx: &channel::Sender<FileSample>,
    in_flight: &AtomicUsize,
    config: &WalkerConfig,
    stats: &parking_lot::Mutex<WalkStats>,
    cancel: &AtomicBool,
) {
    // Read directory entries, gracefully handling races and permissions.
    let entries = match fs::read_dir(dir_path) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::PermissionDenied => return,
        Err(err) if err.kind() == ErrorKind::NotFound => return,
        Err(_) => return,
    };

    for entry_result in entries {
        if cancel.load(Ordering::Acquire) {
            return;
        }

        let Ok(entry) = entry_result else {
            continue;
        };
        let child_path = entry.path();
        let Ok(ft) = entry.file_type() else {
            continue;
        };

        // Symlinks are skipped entirely unless explicitly followed.
        if !config.follow_symlinks && ft.is_symlink() {
            continue;
        }

        let is_dir = if config.follow_symlinks && ft.is_symlink() {
            fs::metadata(&child_path).map(|m| m.is_dir()).unwrap_or(false)
        } else {
            ft.is_dir()
        };

        if is_dir {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if is_pruned_dir(&name, &config.excluded_dir_names) {
                stats.lock().dirs_pruned += 1;
                continue;
            }
            if depth < config.max_depth {
                in_flight.fetch_add(1, Ordering::Release);
                match work_tx.try_send((child_path, depth + 1)) {
                    Ok(()) => {}
                    // Queue full: walk the subtree inline. A blocking send
                    // here can wedge every worker at once, with no thread
                    // left receiving to free a slot.
                    Err(channel::TrySendError::Full((dir, d))) => {
                        process_directory(
                            &dir, d, work_tx, result_tx, in_flight, config, stats, cancel,
                        );
                        in_flight.fetch_sub(1, Ordering::AcqRel);
                    }
                    Err(channel::TrySendError::Disconnected(_)) => {
                        in_flight.fetch_sub(1, Ordering::Release);
                    }
                }
            }
            continue;
        }

        process_file(&child_path, entry, result_tx, config, stats);
    }
}

/// Apply the eligibility rules to one file and sample it if they pass.
fn process_file(
    path: &Path,
    entry: fs::DirEntry,
    result_tx: &channel::Sender<FileSample>,
    config: &WalkerConfig,
    stats: &parking_lot::Mutex<WalkStats>,
) {
    stats.lock().files_seen += 1;

    let ext = lowercase_extension(path);

    if let Some(filter) = &config.extension_filter
        && !filter.contains(&ext)
    {
        stats.lock().skipped_filtered += 1;
        return;
    }

    let Ok(meta) = entry.metadata() else {
        stats.lock().unstatable += 1;
        return;
    };
    let size = meta.len();
    if size == 0 || size < config.min_file_size {
        stats.lock().skipped_small += 1;
        return;
    }

    match entropy::sample_file(path, config.sample_bytes) {
        EntropyReading::Value(entropy) => {
            stats.lock().files_sampled += 1;
            let _ = result_tx.send(FileSample {
                path: path.to_path_buf(),
                entropy,
                size,
                ext,
            });
        }
        EntropyReading::Unreadable => {
            stats.lock().unreadable += 1;
        }
    }
}
