//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use entropy_sentinel::prelude::*;
//! ```

// Core
pub use crate::core::config::{CompareConfig, Config, SamplerConfig, ScannerConfig};
pub use crate::core::errors::{EsnError, Result};

// Sampler
pub use crate::entropy::{EntropyReading, sample_file, shannon};

// Aggregator
pub use crate::scanner::snapshot::{ExtensionStats, FileRecord, Snapshot};
pub use crate::scanner::walker::{TreeWalker, WalkStats, WalkerConfig};
pub use crate::scanner::{scan, scan_with_cancel, scan_with_stats};

// Comparator
pub use crate::compare::{Alert, ComparisonReport, Severity, Signal, compare};

// Persistence
pub use crate::store::{BaselineStore, JsonBaselineStore};
