//! Backup and restore entry points.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use basalt_types::VolumeInfo;

use crate::error::BackupError;
use crate::job::{BackupJob, RestoreJob, SnapshotOpener};
use crate::store::{BackupStore, DeltaBackupConfig, DeltaRestoreConfig, SnapshotSpec, VolumeSpec};
use crate::util::{generate_name, parse_labels, unescape_url, valid_volume_name};

/// Parameters for [`backup_init`].
#[derive(Debug, Clone, Default)]
pub struct BackupParams {
    /// Backup name; generated when empty.
    pub backup_name: Option<String>,
    pub volume_name: String,
    pub snapshot_name: String,
    pub dest_url: String,
    pub backing_image_name: Option<String>,
    pub backing_image_checksum: Option<String>,
    /// `key=value` label strings.
    pub labels: Vec<String>,
    /// Replica directory holding `volume.meta`.
    pub replica_dir: PathBuf,
}

/// Validates parameters, reads the replica's volume metadata and builds
/// the job/config pair for [`backup_create`].
pub fn backup_init(
    params: &BackupParams,
    opener: Arc<dyn SnapshotOpener>,
) -> Result<(Arc<BackupJob>, DeltaBackupConfig), BackupError> {
    if params.volume_name.is_empty() {
        return Err(BackupError::MissingParameter("volume_name"));
    }
    if params.snapshot_name.is_empty() {
        return Err(BackupError::MissingParameter("snapshot_name"));
    }
    if params.dest_url.is_empty() {
        return Err(BackupError::MissingParameter("dest_url"));
    }
    if !valid_volume_name(&params.volume_name) {
        return Err(BackupError::InvalidVolumeName(params.volume_name.clone()));
    }

    let labels = parse_labels(&params.labels)?;

    let volume_info = VolumeInfo::read_from(&params.replica_dir)?;
    if !volume_info.backing_file_path.is_empty() {
        // The backing image must exist before the store starts pulling
        // blocks that resolve into it.
        fs::metadata(&volume_info.backing_file_path)?;
    }

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let backup_name = params
        .backup_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| generate_name("backup"));

    let job = BackupJob::new(backup_name.clone(), opener);
    let config = DeltaBackupConfig {
        backup_name: params.backup_name.clone().filter(|name| !name.is_empty()),
        volume: VolumeSpec {
            name: params.volume_name.clone(),
            size: volume_info.size,
            labels: labels.clone(),
            backing_image_name: params.backing_image_name.clone(),
            backing_image_checksum: params.backing_image_checksum.clone(),
            created_time: now.clone(),
        },
        snapshot: SnapshotSpec {
            name: params.snapshot_name.clone(),
            created_time: now,
        },
        dest_url: params.dest_url.clone(),
        labels,
    };

    info!(
        backup = %backup_name,
        volume = %params.volume_name,
        snapshot = %params.snapshot_name,
        "backup initialized"
    );
    Ok((job, config))
}

/// Drives the delta-block backup through the store, recording the outcome
/// on the job.
pub fn backup_create(
    store: &dyn BackupStore,
    job: &Arc<BackupJob>,
    config: &DeltaBackupConfig,
) -> Result<(), BackupError> {
    match store.create_delta_block_backup(job.as_ref(), config) {
        Ok(is_incremental) => {
            job.set_incremental(is_incremental);
            info!(backup = job.name(), is_incremental, "backup created");
            Ok(())
        }
        Err(err) => {
            job.fail(err.to_string());
            Err(err)
        }
    }
}

/// Restores the backup at `backup_url` into `to_file`.
///
/// The URL arrives escaped from transport and is unescaped before the
/// store sees it.
pub fn restore(
    store: &dyn BackupStore,
    backup_url: &str,
    to_file: &str,
    job: &Arc<RestoreJob>,
) -> Result<(), BackupError> {
    let backup_url = unescape_url(backup_url)?;
    debug!(url = %backup_url, file = to_file, "starting restore");

    let config = DeltaRestoreConfig {
        backup_url,
        filename: to_file.to_string(),
        last_backup_name: None,
    };

    match store.restore_delta_block_backup(job.as_ref(), &config) {
        Ok(()) => {
            job.complete();
            Ok(())
        }
        Err(err) => {
            job.fail(err.to_string());
            Err(err)
        }
    }
}

/// Restores the delta since `last_backup_name` into `delta_file`.
pub fn restore_incremental(
    store: &dyn BackupStore,
    backup_url: &str,
    delta_file: &str,
    last_backup_name: &str,
    job: &Arc<RestoreJob>,
) -> Result<(), BackupError> {
    let backup_url = unescape_url(backup_url)?;
    debug!(url = %backup_url, file = delta_file, "starting incremental restore");

    let config = DeltaRestoreConfig {
        backup_url,
        filename: delta_file.to_string(),
        last_backup_name: Some(last_backup_name.to_string()),
    };

    match store.restore_delta_block_backup_incrementally(job.as_ref(), &config) {
        Ok(()) => {
            job.complete();
            Ok(())
        }
        Err(err) => {
            job.fail(err.to_string());
            Err(err)
        }
    }
}

/// Bootstraps an empty snapshot meta-file via write-to-temp-then-rename.
pub fn create_snapshot_metafile(file: &Path) -> Result<(), BackupError> {
    let tmp = file.with_extension("tmp");
    fs::write(&tmp, b"{\"parent\":\"\"}\n")?;
    fs::rename(&tmp, file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DeltaOps, RestoreOps};
    use basalt_types::ProgressState;
    use std::io;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct MemOpener {
        content: Vec<u8>,
    }

    impl SnapshotOpener for MemOpener {
        fn open(&self, _snapshot_name: &str) -> io::Result<Box<dyn crate::SnapshotSource>> {
            Ok(Box::new(MemSource {
                content: self.content.clone(),
            }))
        }
    }

    struct MemSource {
        content: Vec<u8>,
    }

    impl crate::SnapshotSource for MemSource {
        fn read_at(&self, buf: &mut [u8], offset: i64) -> io::Result<usize> {
            let offset = offset as usize;
            let end = (offset + buf.len()).min(self.content.len());
            let n = end.saturating_sub(offset);
            buf[..n].copy_from_slice(&self.content[offset..end]);
            Ok(n)
        }

        fn size(&self) -> i64 {
            self.content.len() as i64
        }
    }

    /// Store double that drives the DeltaOps callback the way the real
    /// driver does: open, read every block, publish progress, close.
    struct FakeStore {
        block_size: usize,
        seen_blocks: Mutex<Vec<Vec<u8>>>,
        restored_urls: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn new(block_size: usize) -> Self {
            Self {
                block_size,
                seen_blocks: Mutex::new(Vec::new()),
                restored_urls: Mutex::new(Vec::new()),
            }
        }
    }

    impl BackupStore for FakeStore {
        fn create_delta_block_backup(
            &self,
            ops: &dyn DeltaOps,
            config: &DeltaBackupConfig,
        ) -> Result<bool, BackupError> {
            ops.open_snapshot(&config.snapshot.name)?;

            let total = config.volume.size as usize;
            let mut offset = 0usize;
            while offset < total {
                let size = self.block_size.min(total - offset);
                let block = ops.read_block(offset as i64, size)?;
                self.seen_blocks.lock().unwrap().push(block);
                offset += size;
                ops.update_backup_progress(
                    (100 * offset / total) as u8,
                    &config.snapshot.name,
                );
            }

            ops.close_snapshot()?;
            Ok(true)
        }

        fn restore_delta_block_backup(
            &self,
            ops: &dyn RestoreOps,
            config: &DeltaRestoreConfig,
        ) -> Result<(), BackupError> {
            self.restored_urls
                .lock()
                .unwrap()
                .push(config.backup_url.clone());
            ops.update_restore_progress(100);
            Ok(())
        }

        fn restore_delta_block_backup_incrementally(
            &self,
            ops: &dyn RestoreOps,
            config: &DeltaRestoreConfig,
        ) -> Result<(), BackupError> {
            assert!(config.last_backup_name.is_some());
            self.restored_urls
                .lock()
                .unwrap()
                .push(config.backup_url.clone());
            ops.update_restore_progress(100);
            Ok(())
        }
    }

    fn replica_dir(size: i64) -> TempDir {
        let dir = TempDir::new().unwrap();
        VolumeInfo {
            size,
            head: "volume-head-000.img".to_string(),
            dirty: false,
            sector_size: 512,
            backing_file_path: String::new(),
        }
        .write_to(dir.path())
        .unwrap();
        dir
    }

    fn params(dir: &TempDir) -> BackupParams {
        BackupParams {
            backup_name: None,
            volume_name: "vol0".to_string(),
            snapshot_name: "snap0".to_string(),
            dest_url: "s3://bucket@us-east-1/backups".to_string(),
            labels: vec!["team=storage".to_string()],
            replica_dir: dir.path().to_path_buf(),
            ..BackupParams::default()
        }
    }

    #[test]
    fn init_then_create_runs_the_delta_protocol() {
        let dir = replica_dir(1024);
        let opener = Arc::new(MemOpener {
            content: (0..=255u8).cycle().take(1024).collect(),
        });

        let (job, config) = backup_init(&params(&dir), opener.clone()).unwrap();
        assert!(job.name().starts_with("backup-"));
        assert_eq!(config.volume.size, 1024);
        assert_eq!(config.labels["team"], "storage");
        assert!(config.backup_name.is_none());

        let store = FakeStore::new(256);
        backup_create(&store, &job, &config).unwrap();

        let status = job.status();
        assert_eq!(status.state, ProgressState::Complete);
        assert_eq!(status.progress, 100);
        assert!(status.is_incremental);
        assert_eq!(store.seen_blocks.lock().unwrap().len(), 4);
    }

    #[test]
    fn explicit_backup_name_is_kept() {
        let dir = replica_dir(512);
        let mut p = params(&dir);
        p.backup_name = Some("backup-cafe0001".to_string());

        let (job, config) =
            backup_init(&p, Arc::new(MemOpener { content: vec![0; 512] })).unwrap();

        assert_eq!(job.name(), "backup-cafe0001");
        assert_eq!(config.backup_name.as_deref(), Some("backup-cafe0001"));
    }

    #[test]
    fn init_validates_required_parameters() {
        let dir = replica_dir(512);
        let opener: Arc<dyn SnapshotOpener> = Arc::new(MemOpener { content: vec![] });

        let mut p = params(&dir);
        p.volume_name = String::new();
        assert!(matches!(
            backup_init(&p, opener.clone()),
            Err(BackupError::MissingParameter("volume_name"))
        ));

        let mut p = params(&dir);
        p.dest_url = String::new();
        assert!(matches!(
            backup_init(&p, opener.clone()),
            Err(BackupError::MissingParameter("dest_url"))
        ));

        let mut p = params(&dir);
        p.volume_name = "-bad-".to_string();
        assert!(matches!(
            backup_init(&p, opener.clone()),
            Err(BackupError::InvalidVolumeName(_))
        ));

        let mut p = params(&dir);
        p.labels = vec!["notalabel".to_string()];
        assert!(matches!(
            backup_init(&p, opener),
            Err(BackupError::InvalidLabel(_))
        ));
    }

    #[test]
    fn failed_store_marks_the_job() {
        struct FailingStore;

        impl BackupStore for FailingStore {
            fn create_delta_block_backup(
                &self,
                _ops: &dyn DeltaOps,
                _config: &DeltaBackupConfig,
            ) -> Result<bool, BackupError> {
                Err(BackupError::Store("bucket gone".to_string()))
            }

            fn restore_delta_block_backup(
                &self,
                _ops: &dyn RestoreOps,
                _config: &DeltaRestoreConfig,
            ) -> Result<(), BackupError> {
                unreachable!()
            }

            fn restore_delta_block_backup_incrementally(
                &self,
                _ops: &dyn RestoreOps,
                _config: &DeltaRestoreConfig,
            ) -> Result<(), BackupError> {
                unreachable!()
            }
        }

        let dir = replica_dir(512);
        let (job, config) =
            backup_init(&params(&dir), Arc::new(MemOpener { content: vec![0; 512] })).unwrap();

        assert!(backup_create(&FailingStore, &job, &config).is_err());

        let status = job.status();
        assert_eq!(status.state, ProgressState::Error);
        assert!(status.error.contains("bucket gone"));
    }

    #[test]
    fn restore_unescapes_the_url() {
        let store = FakeStore::new(256);
        let job = RestoreJob::new("s3%3A%2F%2Fbucket%2Fb1", "restore.img");

        restore(&store, "s3%3A%2F%2Fbucket%2Fb1", "restore.img", &job).unwrap();

        assert_eq!(
            store.restored_urls.lock().unwrap().as_slice(),
            &["s3://bucket/b1".to_string()]
        );
        assert_eq!(job.status().state, ProgressState::Complete);
    }

    #[test]
    fn incremental_restore_carries_the_last_backup() {
        let store = FakeStore::new(256);
        let job = RestoreJob::new("url", "delta.img");

        restore_incremental(&store, "s3%3A%2F%2Fb%2F2", "delta.img", "backup-1", &job).unwrap();

        assert_eq!(job.status().progress, 100);
    }

    #[test]
    fn metafile_bootstrap() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("snap0.img.meta");

        create_snapshot_metafile(&file).unwrap();

        assert_eq!(fs::read(&file).unwrap(), b"{\"parent\":\"\"}\n");
        assert!(!file.with_extension("tmp").exists());
    }

    #[test]
    fn backup_registry_keeps_five_finished() {
        let registry = crate::BackupList::new(crate::MAX_BACKUPS);
        let opener: Arc<dyn SnapshotOpener> = Arc::new(MemOpener { content: vec![] });

        for i in 0..8 {
            let job = BackupJob::new(format!("backup-{i}"), opener.clone());
            job.update_backup_progress(100, "snap0");
            registry.add(&format!("backup-{i}"), job).unwrap();
        }

        assert_eq!(registry.len(), crate::MAX_BACKUPS);
        assert_eq!(
            registry.keys(),
            (3..8).map(|i| format!("backup-{i}")).collect::<Vec<_>>()
        );
    }
}
