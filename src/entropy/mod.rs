//! Shannon entropy sampling.
//!
//! Entropy measures the randomness of byte data in bits/byte. Normal files
//! (text, documents) sit around 4-6, already-compressed formats around
//! 7.5-7.9, encrypted output at 7.99+. The scanner tracks entropy *change*
//! over time rather than absolute values: a `.zip` is always high entropy,
//! a `.docx` that jumps from 4.2 to 7.98 is a problem.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Result of sampling one file.
///
/// `Unreadable` is distinct from `Value(0.0)`: an empty or all-zero-byte file
/// legitimately reads as zero entropy, while a permission or I/O failure
/// carries no evidence at all and excludes the file from aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntropyReading {
    /// Measured entropy in bits/byte, always in `[0, 8]`.
    Value(f64),
    /// The file could not be read; soft failure, not an anomaly signal.
    Unreadable,
}

impl EntropyReading {
    /// The measured value, or `None` when unreadable.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unreadable => None,
        }
    }

    #[must_use]
    pub const fn is_unreadable(self) -> bool {
        matches!(self, Self::Unreadable)
    }
}

/// Shannon entropy of a byte slice in bits/byte.
///
/// Returns `0.0` for empty input and at most `8.0` (all 256 byte values
/// equally represented). Single pass, fixed 256-bin frequency table, no
/// allocations.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn shannon(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut frequency = [0u64; 256];
    for &byte in data {
        frequency[byte as usize] += 1;
    }

    let len = data.len() as f64;
    let mut entropy = 0.0;
    for &count in &frequency {
        // Zero counts contribute nothing; log2(0) must not be evaluated.
        if count > 0 {
            let p = count as f64 / len;
            entropy -= p * p.log2();
        }
    }

    entropy
}

/// Sample the entropy of a file from a bounded prefix.
///
/// Reads at most `max_sample_bytes` from the start of the file; the prefix
/// entropy stands in for the whole file, the deliberate performance trade-off
/// for scanning large trees. Any open or read failure yields
/// [`EntropyReading::Unreadable`] rather than an error.
#[must_use]
pub fn sample_file(path: &Path, max_sample_bytes: usize) -> EntropyReading {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return EntropyReading::Unreadable,
    };

    let mut buf = Vec::with_capacity(max_sample_bytes.min(1 << 20));
    match file.take(max_sample_bytes as u64).read_to_end(&mut buf) {
        Ok(_) => EntropyReading::Value(shannon(&buf)),
        Err(_) => EntropyReading::Unreadable,
    }
}
