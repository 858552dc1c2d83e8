//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{EsnError, Result};

/// Full Entropy Sentinel configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub scanner: ScannerConfig,
    pub compare: CompareConfig,
    pub paths: PathsConfig,
}

/// Per-file entropy sampling knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplerConfig {
    /// Maximum bytes read from the start of each file. The prefix entropy is
    /// used as a proxy for whole-file entropy.
    pub sample_bytes: usize,
    /// Files strictly smaller than this are skipped: entropy of tiny samples
    /// is statistically unstable and spikes regardless of content.
    pub min_file_size: u64,
    /// Entropy (bits/byte) above which a file counts as high entropy.
    pub high_threshold: f64,
    /// Entropy above which a file counts as very high entropy and is
    /// retained as a suspicious record.
    pub very_high_threshold: f64,
}

/// Tree traversal behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Directory names pruned from traversal entirely, in addition to the
    /// built-in rule skipping any name that starts with `.`.
    pub excluded_dir_names: Vec<String>,
    pub max_depth: usize,
    pub parallelism: usize,
    pub follow_symlinks: bool,
}

/// Snapshot comparison thresholds and exclusions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompareConfig {
    /// Entropy increase (bits/byte) that triggers spike alerts.
    pub spike_threshold: f64,
    /// Percentage of baseline files turning very-high that triggers the
    /// mass-encryption alert.
    pub mass_encryption_pct: f64,
    /// Extensions exempt from per-extension shift alerts: formats expected
    /// to be high entropy already (archives, pre-compressed media).
    pub excluded_extensions: Vec<String>,
}

/// Filesystem paths used by esn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub baseline_dir: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_bytes: 65_536,
            min_file_size: 64,
            high_threshold: 7.5,
            very_high_threshold: 7.9,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            excluded_dir_names: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "__pycache__".to_string(),
                "target".to_string(),
                "vendor".to_string(),
            ],
            max_depth: 64,
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
            follow_symlinks: false,
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            spike_threshold: 1.5,
            mass_encryption_pct: 20.0,
            excluded_extensions: vec![
                ".zip".to_string(),
                ".gz".to_string(),
                ".7z".to_string(),
                ".jpg".to_string(),
                ".png".to_string(),
                ".mp4".to_string(),
            ],
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[ESN-CONFIG] WARNING: HOME not set, falling back to /tmp for paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("esn").join("config.toml");
        let data = home_dir.join(".local").join("share").join("esn");
        Self {
            config_file: cfg,
            baseline_dir: data.join("baselines"),
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| EsnError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(EsnError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // sampler
        set_env_usize("ESN_SAMPLER_SAMPLE_BYTES", &mut self.sampler.sample_bytes)?;
        set_env_u64("ESN_SAMPLER_MIN_FILE_SIZE", &mut self.sampler.min_file_size)?;
        set_env_f64(
            "ESN_SAMPLER_HIGH_THRESHOLD",
            &mut self.sampler.high_threshold,
        )?;
        set_env_f64(
            "ESN_SAMPLER_VERY_HIGH_THRESHOLD",
            &mut self.sampler.very_high_threshold,
        )?;

        // scanner
        set_env_usize("ESN_SCANNER_MAX_DEPTH", &mut self.scanner.max_depth)?;
        set_env_usize("ESN_SCANNER_PARALLELISM", &mut self.scanner.parallelism)?;
        set_env_bool(
            "ESN_SCANNER_FOLLOW_SYMLINKS",
            &mut self.scanner.follow_symlinks,
        )?;

        // compare
        set_env_f64(
            "ESN_COMPARE_SPIKE_THRESHOLD",
            &mut self.compare.spike_threshold,
        )?;
        set_env_f64(
            "ESN_COMPARE_MASS_ENCRYPTION_PCT",
            &mut self.compare.mass_encryption_pct,
        )?;

        Ok(())
    }

    /// Normalize exclusion lists for consistent comparison: extensions are
    /// matched lowercase with a leading dot.
    fn normalize(&mut self) {
        for ext in &mut self.compare.excluded_extensions {
            let lowered = ext.to_lowercase();
            *ext = if lowered.starts_with('.') {
                lowered
            } else {
                format!(".{lowered}")
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sampler.sample_bytes == 0 {
            return Err(EsnError::InvalidConfig {
                details: "sampler.sample_bytes must be > 0".to_string(),
            });
        }

        for (name, val) in [
            ("high_threshold", self.sampler.high_threshold),
            ("very_high_threshold", self.sampler.very_high_threshold),
        ] {
            if !(0.0..=8.0).contains(&val) {
                return Err(EsnError::InvalidConfig {
                    details: format!("sampler.{name} must be in [0, 8] bits/byte, got {val}"),
                });
            }
        }

        if self.sampler.high_threshold >= self.sampler.very_high_threshold {
            return Err(EsnError::InvalidConfig {
                details: format!(
                    "sampler.high_threshold ({}) must be < very_high_threshold ({})",
                    self.sampler.high_threshold, self.sampler.very_high_threshold
                ),
            });
        }

        if self.scanner.parallelism == 0 {
            return Err(EsnError::InvalidConfig {
                details: "scanner.parallelism must be >= 1".to_string(),
            });
        }
        if self.scanner.max_depth == 0 {
            return Err(EsnError::InvalidConfig {
                details: "scanner.max_depth must be >= 1".to_string(),
            });
        }

        if self.compare.spike_threshold <= 0.0 || self.compare.spike_threshold > 8.0 {
            return Err(EsnError::InvalidConfig {
                details: format!(
                    "compare.spike_threshold must be in (0, 8], got {}",
                    self.compare.spike_threshold
                ),
            });
        }

        if self.compare.mass_encryption_pct <= 0.0 || self.compare.mass_encryption_pct > 100.0 {
            return Err(EsnError::InvalidConfig {
                details: format!(
                    "compare.mass_encryption_pct must be in (0, 100], got {}",
                    self.compare.mass_encryption_pct
                ),
            });
        }

        Ok(())
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// Uses FNV-1a for cross-process-stable hashing (no `DefaultHasher`
    /// whose seed may vary across Rust releases).
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        Ok(format!("{:016x}", fnv1a(canonical.as_bytes())))
    }
}

/// FNV-1a over a byte slice. Also used for baseline file naming.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_f64(name: &str, slot: &mut f64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<f64>().map_err(|error| EsnError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| EsnError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_usize(name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw
            .parse::<usize>()
            .map_err(|error| EsnError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_env_bool(name: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<bool>().map_err(|error| EsnError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn default_thresholds_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sampler.sample_bytes, 65_536);
        assert_eq!(cfg.sampler.min_file_size, 64);
        assert!((cfg.sampler.high_threshold - 7.5).abs() < f64::EPSILON);
        assert!((cfg.sampler.very_high_threshold - 7.9).abs() < f64::EPSILON);
        assert!((cfg.compare.spike_threshold - 1.5).abs() < f64::EPSILON);
        assert!((cfg.compare.mass_encryption_pct - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_ordering_enforced() {
        let mut cfg = Config::default();
        cfg.sampler.high_threshold = 7.95;
        let err = cfg.validate().expect_err("expected threshold error");
        assert!(err.to_string().contains("very_high_threshold"));
    }

    #[test]
    fn threshold_out_of_entropy_range_rejected() {
        let mut cfg = Config::default();
        cfg.sampler.very_high_threshold = 9.0;
        let err = cfg.validate().expect_err("expected range error");
        assert!(err.to_string().contains("[0, 8]"));
    }

    #[test]
    fn zero_sample_bytes_rejected() {
        let mut cfg = Config::default();
        cfg.sampler.sample_bytes = 0;
        let err = cfg.validate().expect_err("expected sample_bytes error");
        assert!(err.to_string().contains("sample_bytes"));
    }

    #[test]
    fn zero_parallelism_rejected() {
        let mut cfg = Config::default();
        cfg.scanner.parallelism = 0;
        let err = cfg.validate().expect_err("expected parallelism error");
        assert!(err.to_string().contains("parallelism"));
    }

    #[test]
    fn spike_threshold_must_be_positive() {
        let mut cfg = Config::default();
        cfg.compare.spike_threshold = 0.0;
        let err = cfg.validate().expect_err("expected spike threshold error");
        assert!(err.to_string().contains("spike_threshold"));
    }

    #[test]
    fn mass_pct_range_enforced() {
        let mut cfg = Config::default();
        cfg.compare.mass_encryption_pct = 150.0;
        let err = cfg.validate().expect_err("expected pct error");
        assert!(err.to_string().contains("mass_encryption_pct"));
    }

    #[test]
    fn normalize_lowercases_and_dots_extensions() {
        let mut cfg = Config::default();
        cfg.compare.excluded_extensions = vec!["ZIP".to_string(), ".Rar".to_string()];
        cfg.normalize();
        assert_eq!(cfg.compare.excluded_extensions, vec![".zip", ".rar"]);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/esn/config.toml")));
        let err = result.unwrap_err();
        assert!(matches!(err, EsnError::MissingConfig { .. }));
    }

    #[test]
    fn load_parses_toml_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[sampler]
sample_bytes = 4096
min_file_size = 128

[compare]
spike_threshold = 2.0
"#,
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.sampler.sample_bytes, 4096);
        assert_eq!(cfg.sampler.min_file_size, 128);
        assert!((cfg.compare.spike_threshold - 2.0).abs() < f64::EPSILON);
        // Unspecified sections keep defaults.
        assert!((cfg.sampler.high_threshold - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stable_hash_deterministic_and_sensitive() {
        let cfg = Config::default();
        let h1 = cfg.stable_hash().expect("hash");
        let h2 = cfg.stable_hash().expect("hash");
        assert_eq!(h1, h2);

        let mut modified = Config::default();
        modified.scanner.max_depth += 1;
        let h3 = modified.stable_hash().expect("hash");
        assert_ne!(h1, h3);
    }

    #[test]
    fn fnv1a_known_vector() {
        // FNV-1a of empty input is the offset basis.
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_ne!(fnv1a(b"a"), fnv1a(b"b"));
    }
}
