//! # basalt-backup: Backup orchestration
//!
//! Drives delta-block backups and restores through the external
//! [`BackupStore`] driver. The orchestrator validates parameters, reads
//! the replica's volume metadata and hands the store a [`DeltaOps`]
//! callback (the [`BackupJob`] itself) through which the store reads
//! snapshot blocks and publishes progress. Jobs are tracked in a bounded
//! [`BackupList`] registry keeping the five most recently finished
//! backups.

mod error;
mod job;
mod orchestrator;
mod store;
mod util;

pub use error::BackupError;
pub use job::{
    BackupJob, BackupStatus, RestoreJob, RestoreStatus, SnapshotOpener, SnapshotSource,
};
pub use orchestrator::{
    BackupParams, backup_create, backup_init, create_snapshot_metafile, restore,
    restore_incremental,
};
pub use store::{
    BackupStore, DeltaBackupConfig, DeltaOps, DeltaRestoreConfig, RestoreOps, SnapshotSpec,
    VolumeSpec,
};
pub use util::{generate_name, parse_labels, response_output, unescape_url, valid_volume_name};

/// Bounded registry of backup jobs keyed by backup name.
pub type BackupList = basalt_registry::Registry<BackupJob>;

/// Retained finished backups.
pub const MAX_BACKUPS: usize = 5;
