//! The backup store seam.
//!
//! The delta-block protocol itself lives in the external backup store
//! driver; the engine only supplies data and receives progress through
//! the callback interfaces here.

use std::collections::HashMap;

use crate::error::BackupError;

/// Volume description handed to the store.
#[derive(Debug, Clone)]
pub struct VolumeSpec {
    pub name: String,
    pub size: i64,
    pub labels: HashMap<String, String>,
    pub backing_image_name: Option<String>,
    pub backing_image_checksum: Option<String>,
    pub created_time: String,
}

/// Snapshot description handed to the store.
#[derive(Debug, Clone)]
pub struct SnapshotSpec {
    pub name: String,
    pub created_time: String,
}

/// Everything the store needs to create one delta backup.
#[derive(Debug, Clone)]
pub struct DeltaBackupConfig {
    /// Backup name requested by the caller; the store assigns one when
    /// absent.
    pub backup_name: Option<String>,
    pub volume: VolumeSpec,
    pub snapshot: SnapshotSpec,
    pub dest_url: String,
    pub labels: HashMap<String, String>,
}

/// Everything the store needs to restore one backup.
#[derive(Debug, Clone)]
pub struct DeltaRestoreConfig {
    /// Unescaped backup URL.
    pub backup_url: String,
    /// Target file for the restored image (or delta file, for
    /// incremental restores).
    pub filename: String,
    /// Last restored backup, for incremental restores.
    pub last_backup_name: Option<String>,
}

/// Callback capability the store borrows for the duration of a backup.
pub trait DeltaOps: Send + Sync {
    /// Opens the snapshot the backup reads from.
    fn open_snapshot(&self, snapshot_name: &str) -> Result<(), BackupError>;

    /// Reads one block of snapshot data.
    fn read_block(&self, offset: i64, size: usize) -> Result<Vec<u8>, BackupError>;

    /// Closes the snapshot opened by `open_snapshot`.
    fn close_snapshot(&self) -> Result<(), BackupError>;

    /// Publishes backup progress, 0..=100.
    fn update_backup_progress(&self, progress: u8, snapshot_id: &str);
}

/// Callback capability the store borrows for the duration of a restore.
pub trait RestoreOps: Send + Sync {
    /// Publishes restore progress, 0..=100.
    fn update_restore_progress(&self, progress: u8);
}

/// The external backup object-store driver.
pub trait BackupStore: Send + Sync {
    /// Creates a delta-block backup, returning whether it was incremental
    /// over a previous backup.
    fn create_delta_block_backup(
        &self,
        ops: &dyn DeltaOps,
        config: &DeltaBackupConfig,
    ) -> Result<bool, BackupError>;

    /// Restores a full backup into `config.filename`.
    fn restore_delta_block_backup(
        &self,
        ops: &dyn RestoreOps,
        config: &DeltaRestoreConfig,
    ) -> Result<(), BackupError>;

    /// Restores the delta between `config.last_backup_name` and the
    /// backup at `config.backup_url` into `config.filename`.
    fn restore_delta_block_backup_incrementally(
        &self,
        ops: &dyn RestoreOps,
        config: &DeltaRestoreConfig,
    ) -> Result<(), BackupError>;
}
