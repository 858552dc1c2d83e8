#![forbid(unsafe_code)]

//! Entropy Sentinel (esn) — entropy baseline scanner for bulk-encryption
//! detection.
//!
//! The pipeline has three pure stages:
//! 1. **Sampler** — Shannon entropy of a bounded file prefix
//! 2. **Aggregator** — parallel tree walk folding readings into a [`scanner::snapshot::Snapshot`]
//! 3. **Comparator** — baseline-vs-current anomaly checks producing severity-tagged alerts
//!
//! A `.zip` is always high entropy; a `.docx` tree whose average jumps from
//! 4.2 to 7.9 bits/byte is the signal this tool exists for.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use entropy_sentinel::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use entropy_sentinel::core::config::Config;
//! use entropy_sentinel::scanner::scan;
//! ```

pub mod prelude;

pub mod compare;
pub mod core;
pub mod entropy;
pub mod logger;
pub mod scanner;
pub mod store;
