//! Hash subsystem error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from hash jobs and provenance handling.
#[derive(Debug, Error)]
pub enum HashError {
    /// The node-wide hash lock (or its directory) could not be taken.
    #[error("failed to acquire snapshot hash lock at {path}: {source}")]
    LockUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The job's cancel token tripped between reads.
    #[error("hash job cancelled")]
    Cancelled,

    /// A provenance record larger than the xattr value budget.
    #[error("snapshot metadata value of {0} bytes exceeds the 256-byte limit")]
    ValueTooLarge(usize),

    /// The stored provenance record failed to parse.
    #[error("malformed snapshot metadata: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Any filesystem error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
