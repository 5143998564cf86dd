//! Backup and restore job state.

use std::io;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use basalt_registry::RetainedJob;
use basalt_types::ProgressState;

use crate::error::BackupError;
use crate::store::{DeltaOps, RestoreOps};

/// Read access to one open snapshot, provided by the replica store.
pub trait SnapshotSource: Send + Sync {
    /// Reads snapshot contents at `offset`.
    fn read_at(&self, buf: &mut [u8], offset: i64) -> io::Result<usize>;

    /// Snapshot size in bytes.
    fn size(&self) -> i64;
}

/// Opens snapshots by name, provided by the replica store.
pub trait SnapshotOpener: Send + Sync {
    fn open(&self, snapshot_name: &str) -> io::Result<Box<dyn SnapshotSource>>;
}

/// Pollable status of one backup job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    pub state: ProgressState,
    pub progress: u8,
    pub error: String,
    pub snapshot_id: String,
    pub is_incremental: bool,
}

/// One backup job; doubles as the [`DeltaOps`] callback the store drives.
///
/// Ownership is shared: the store borrows the callback for the duration
/// of the backup while the registry retains the authoritative reference.
pub struct BackupJob {
    name: String,
    opener: Arc<dyn SnapshotOpener>,
    snapshot: Mutex<Option<Box<dyn SnapshotSource>>>,
    status: Mutex<BackupStatus>,
}

impl BackupJob {
    /// Creates a job at progress 0.
    pub fn new(name: impl Into<String>, opener: Arc<dyn SnapshotOpener>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            opener,
            snapshot: Mutex::new(None),
            status: Mutex::new(BackupStatus {
                state: ProgressState::InProgress,
                progress: 0,
                error: String::new(),
                snapshot_id: String::new(),
                is_incremental: false,
            }),
        })
    }

    /// The backup name, which keys the job in the registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A point-in-time copy of the status.
    pub fn status(&self) -> BackupStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    /// Status as the stable tooling JSON shape.
    pub fn status_json(&self) -> serde_json::Value {
        serde_json::to_value(self.status()).expect("status serializes")
    }

    pub(crate) fn set_incremental(&self, is_incremental: bool) {
        self.status
            .lock()
            .expect("status lock poisoned")
            .is_incremental = is_incremental;
    }

    pub(crate) fn fail(&self, error: String) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if status.state.is_terminal() {
            warn!(backup = %self.name, "ignoring transition on finished backup job");
            return;
        }
        status.state = ProgressState::Error;
        status.error = error;
    }
}

impl DeltaOps for BackupJob {
    fn open_snapshot(&self, snapshot_name: &str) -> Result<(), BackupError> {
        let source = self.opener.open(snapshot_name)?;
        *self.snapshot.lock().expect("snapshot lock poisoned") = Some(source);
        self.status
            .lock()
            .expect("status lock poisoned")
            .snapshot_id = snapshot_name.to_string();
        Ok(())
    }

    fn read_block(&self, offset: i64, size: usize) -> Result<Vec<u8>, BackupError> {
        let guard = self.snapshot.lock().expect("snapshot lock poisoned");
        let source = guard.as_ref().ok_or(BackupError::SnapshotNotOpen)?;
        let mut buf = vec![0u8; size];
        let n = source.read_at(&mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn close_snapshot(&self) -> Result<(), BackupError> {
        self.snapshot.lock().expect("snapshot lock poisoned").take();
        Ok(())
    }

    fn update_backup_progress(&self, progress: u8, snapshot_id: &str) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if status.state.is_terminal() {
            return;
        }
        status.progress = progress.min(100);
        status.snapshot_id = snapshot_id.to_string();
        if status.progress == 100 {
            status.state = ProgressState::Complete;
        }
    }
}

impl RetainedJob for BackupJob {
    // Only finished backups are bounded; errored ones linger until
    // explicitly deleted.
    const RETENTION_CLASSES: usize = 1;

    fn retention_class(&self) -> Option<usize> {
        let status = self.status.lock().expect("status lock poisoned");
        (status.progress == 100).then_some(0)
    }

    fn is_terminal(&self) -> bool {
        let status = self.status.lock().expect("status lock poisoned");
        status.progress == 100 || status.state == ProgressState::Error
    }
}

/// Pollable status of one restore job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatus {
    pub state: ProgressState,
    pub progress: u8,
    pub error: String,
    pub backup_url: String,
    pub filename: String,
}

/// One restore job; doubles as the [`RestoreOps`] callback.
pub struct RestoreJob {
    status: Mutex<RestoreStatus>,
}

impl RestoreJob {
    pub fn new(backup_url: impl Into<String>, filename: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(RestoreStatus {
                state: ProgressState::InProgress,
                progress: 0,
                error: String::new(),
                backup_url: backup_url.into(),
                filename: filename.into(),
            }),
        })
    }

    pub fn status(&self) -> RestoreStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    pub(crate) fn complete(&self) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if status.state.is_terminal() {
            return;
        }
        status.state = ProgressState::Complete;
        status.progress = 100;
    }

    pub(crate) fn fail(&self, error: String) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if status.state.is_terminal() {
            return;
        }
        status.state = ProgressState::Error;
        status.error = error;
    }
}

impl RestoreOps for RestoreJob {
    fn update_restore_progress(&self, progress: u8) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if status.state.is_terminal() {
            return;
        }
        status.progress = progress.min(100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullOpener;

    impl SnapshotOpener for NullOpener {
        fn open(&self, _snapshot_name: &str) -> io::Result<Box<dyn SnapshotSource>> {
            Ok(Box::new(NullSource))
        }
    }

    struct NullSource;

    impl SnapshotSource for NullSource {
        fn read_at(&self, buf: &mut [u8], _offset: i64) -> io::Result<usize> {
            buf.fill(7);
            Ok(buf.len())
        }

        fn size(&self) -> i64 {
            4096
        }
    }

    #[test]
    fn read_block_requires_open_snapshot() {
        let job = BackupJob::new("backup-1", Arc::new(NullOpener));

        assert!(matches!(
            job.read_block(0, 16),
            Err(BackupError::SnapshotNotOpen)
        ));

        job.open_snapshot("snap0").unwrap();
        assert_eq!(job.read_block(0, 16).unwrap(), vec![7u8; 16]);

        job.close_snapshot().unwrap();
        assert!(matches!(
            job.read_block(0, 16),
            Err(BackupError::SnapshotNotOpen)
        ));
    }

    #[test]
    fn progress_100_completes_the_job() {
        let job = BackupJob::new("backup-1", Arc::new(NullOpener));

        job.update_backup_progress(50, "snap0");
        assert_eq!(job.status().state, ProgressState::InProgress);
        assert!(!job.is_terminal());

        job.update_backup_progress(100, "snap0");
        let status = job.status();
        assert_eq!(status.state, ProgressState::Complete);
        assert_eq!(status.snapshot_id, "snap0");
        assert!(job.is_terminal());
        assert_eq!(job.retention_class(), Some(0));
    }

    #[test]
    fn errored_job_is_terminal_but_not_retained() {
        let job = BackupJob::new("backup-1", Arc::new(NullOpener));

        job.fail("store unreachable".to_string());

        assert!(job.is_terminal());
        assert_eq!(job.retention_class(), None);
        // Terminal means frozen.
        job.update_backup_progress(100, "snap0");
        assert_eq!(job.status().state, ProgressState::Error);
    }

    #[test]
    fn status_json_shape() {
        let job = BackupJob::new("backup-1", Arc::new(NullOpener));
        job.set_incremental(true);
        job.update_backup_progress(100, "snap0");

        let json = job.status_json();

        assert_eq!(json["state"], "complete");
        assert_eq!(json["progress"], 100);
        assert_eq!(json["isIncremental"], true);
        assert_eq!(json["snapshotId"], "snap0");
    }

    #[test]
    fn restore_job_progress_and_completion() {
        let job = RestoreJob::new("s3://bucket@region/backup", "restore.img");

        job.update_restore_progress(40);
        assert_eq!(job.status().progress, 40);

        job.complete();
        let status = job.status();
        assert_eq!(status.state, ProgressState::Complete);
        assert_eq!(status.progress, 100);

        job.fail("late".to_string());
        assert_eq!(job.status().state, ProgressState::Complete);
    }
}
