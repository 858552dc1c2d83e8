//! Baseline persistence as an injected capability.
//!
//! The core never decides where snapshots live; callers hand it a
//! [`BaselineStore`]. The bundled [`JsonBaselineStore`] writes the snapshot's
//! JSON document form under a configurable directory, one file per scan root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::fnv1a;
use crate::core::errors::{EsnError, Result};
use crate::scanner::snapshot::Snapshot;

/// Storage capability for baseline snapshots, keyed by scan root.
pub trait BaselineStore {
    /// Persist `snapshot` as the baseline for its root path.
    /// Returns the location it was written to.
    fn save(&self, snapshot: &Snapshot) -> Result<PathBuf>;

    /// Load the baseline previously saved for `root`.
    fn load(&self, root: &Path) -> Result<Snapshot>;
}

/// JSON-file baseline store: `<dir>/baseline-<fnv16>.json`.
///
/// The file name derives from an FNV-1a hash of the normalized root path,
/// so repeated scans of the same root overwrite their own baseline and
/// different roots never collide in practice.
#[derive(Debug, Clone)]
pub struct JsonBaselineStore {
    dir: PathBuf,
}

impl JsonBaselineStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where the baseline for `root` is (or would be) stored.
    #[must_use]
    pub fn baseline_path(&self, root: &Path) -> PathBuf {
        let raw = root.to_string_lossy();
        let normalized = if raw.len() > 1 {
            raw.strip_suffix('/').unwrap_or(&raw)
        } else {
            &raw
        };
        self.dir
            .join(format!("baseline-{:016x}.json", fnv1a(normalized.as_bytes())))
    }
}

impl BaselineStore for JsonBaselineStore {
    fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|source| EsnError::io(&self.dir, source))?;

        let path = self.baseline_path(&snapshot.path);
        let json = snapshot.to_json()?;

        // Write-then-rename so a crash mid-write never corrupts an existing
        // baseline.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| EsnError::io(&tmp, source))?;
        fs::rename(&tmp, &path).map_err(|source| EsnError::io(&path, source))?;

        Ok(path)
    }

    fn load(&self, root: &Path) -> Result<Snapshot> {
        let path = self.baseline_path(root);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(EsnError::MissingBaseline { path });
            }
            Err(source) => return Err(EsnError::io(&path, source)),
        };
        Snapshot::from_json(&raw)
    }
}
