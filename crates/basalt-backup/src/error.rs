//! Backup error types.

use thiserror::Error;

use basalt_types::VolumeMetaError;

/// Errors from backup orchestration.
#[derive(Debug, Error)]
pub enum BackupError {
    /// A required parameter is empty.
    #[error("cannot find valid required parameter: {0}")]
    MissingParameter(&'static str),

    /// The volume name violates the lexical rule.
    #[error("invalid volume name {0} for backup")]
    InvalidVolumeName(String),

    /// A label is not a well-formed `key=value` pair.
    #[error("cannot parse backup label {0}")]
    InvalidLabel(String),

    /// The backup URL failed to unescape.
    #[error("invalid backup url: {0}")]
    InvalidUrl(String),

    /// A block read before `open_snapshot` (or after `close_snapshot`).
    #[error("snapshot is not open")]
    SnapshotNotOpen,

    /// Failure reported by the backup store driver.
    #[error("backup store error: {0}")]
    Store(String),

    /// The replica's volume metadata could not be read.
    #[error(transparent)]
    VolumeMeta(#[from] VolumeMetaError),

    /// Any filesystem error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
