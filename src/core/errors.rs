//! ESN-prefixed error types with structured error codes.
//!
//! Per-file failures (unreadable, unstatable) are deliberately *not* errors:
//! they are soft skips handled inside the scanner. Only traversal-level and
//! boundary failures surface here.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, EsnError>;

/// Top-level error type for Entropy Sentinel.
#[derive(Debug, Error)]
pub enum EsnError {
    #[error("[ESN-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ESN-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ESN-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ESN-2001] invalid scan root {path}: {details}")]
    InvalidRoot { path: PathBuf, details: String },

    #[error("[ESN-2002] scan cancelled before completion")]
    Cancelled,

    #[error("[ESN-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ESN-2102] no baseline snapshot found at {path}")]
    MissingBaseline { path: PathBuf },

    #[error("[ESN-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EsnError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ESN-1001",
            Self::MissingConfig { .. } => "ESN-1002",
            Self::ConfigParse { .. } => "ESN-1003",
            Self::InvalidRoot { .. } => "ESN-2001",
            Self::Cancelled => "ESN-2002",
            Self::Serialization { .. } => "ESN-2101",
            Self::MissingBaseline { .. } => "ESN-2102",
            Self::Io { .. } => "ESN-3001",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for EsnError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for EsnError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_errors() -> Vec<EsnError> {
        vec![
            EsnError::InvalidConfig {
                details: String::new(),
            },
            EsnError::MissingConfig {
                path: PathBuf::new(),
            },
            EsnError::ConfigParse {
                context: "",
                details: String::new(),
            },
            EsnError::InvalidRoot {
                path: PathBuf::new(),
                details: String::new(),
            },
            EsnError::Cancelled,
            EsnError::Serialization {
                context: "",
                details: String::new(),
            },
            EsnError::MissingBaseline {
                path: PathBuf::new(),
            },
            EsnError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = sample_errors();
        let codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_esn_prefix() {
        for err in &sample_errors() {
            assert!(
                err.code().starts_with("ESN-"),
                "code {} must start with ESN-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = EsnError::InvalidConfig {
            details: "bad value".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("ESN-1001"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("bad value"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(
            EsnError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            }
            .is_retryable()
        );

        assert!(
            !EsnError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !EsnError::InvalidRoot {
                path: PathBuf::new(),
                details: String::new()
            }
            .is_retryable()
        );
        assert!(!EsnError::Cancelled.is_retryable());
    }

    #[test]
    fn io_convenience_constructor() {
        let err = EsnError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "ESN-3001");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: EsnError = json_err.into();
        assert_eq!(err.code(), "ESN-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: EsnError = toml_err.into();
        assert_eq!(err.code(), "ESN-1003");
    }
}
