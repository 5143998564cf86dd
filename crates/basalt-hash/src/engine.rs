//! The hash job state machine.
//!
//! One run hashes one snapshot disk file under the node-wide lock:
//!
//! 1. take the hash lock,
//! 2. stat the file and capture its mtime,
//! 3. short-circuit when the sticky corruption marker already covers this
//!    mtime,
//! 4. short-circuit on a cached checksum unless `rehash` was requested or
//!    the mtime moved,
//! 5. stream the file through the selected hash, honoring cancellation
//!    between reads,
//! 6. compare against recorded provenance with the same mtime: a
//!    difference is silent corruption; mark it sticky and keep the old
//!    recorded checksum,
//! 7. otherwise persist fresh provenance,
//! 8. re-stat: if the mtime moved during the run, drop the record rather
//!    than leave a checksum bound to a stale mtime.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, info, warn};

use basalt_crypto::{HashMethod, SnapshotHasher};

use crate::error::HashError;
use crate::job::{CancelToken, SnapshotHashJob};
use crate::lock::HashLock;
use crate::provenance::{self, SnapshotHashInfo};

/// Streaming read chunk size.
pub const DEFAULT_BLOCK_SIZE: usize = 2 * 1024 * 1024;

/// Returns the file's mtime rendered as an RFC 3339 UTC string with
/// nanosecond precision, the form stored in provenance records.
pub fn snapshot_mod_time(path: &Path) -> Result<String, HashError> {
    let modified: DateTime<Utc> = fs::metadata(path)?.modified()?.into();
    Ok(modified.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Executes hash jobs against snapshot files.
pub struct HashEngine {
    lock: HashLock,
    method: HashMethod,
    block_size: usize,
}

struct Outcome {
    checksum: String,
    silently_corrupted: bool,
}

impl HashEngine {
    pub fn new(lock_dir: impl AsRef<Path>, method: HashMethod) -> Self {
        Self {
            lock: HashLock::new(lock_dir),
            method,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Overrides the streaming chunk size. Intended for tests; production
    /// reads should stay at multi-megabyte chunks.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be positive");
        self.block_size = block_size;
        self
    }

    /// Runs `job` against `snapshot_path` to completion, recording the
    /// terminal state on the job.
    pub fn run(&self, job: &SnapshotHashJob, snapshot_path: &Path) {
        info!(
            snapshot = job.snapshot_name(),
            rehash = job.rehash(),
            "hashing snapshot"
        );

        match self.execute(job, snapshot_path) {
            Ok(outcome) => {
                info!(
                    snapshot = job.snapshot_name(),
                    checksum = %outcome.checksum,
                    silently_corrupted = outcome.silently_corrupted,
                    "snapshot hash finished"
                );
                job.complete(outcome.checksum, outcome.silently_corrupted);
            }
            Err(err) => {
                error!(snapshot = job.snapshot_name(), %err, "snapshot hash failed");
                job.fail(err.to_string());
            }
        }
    }

    /// Spawns `run` on its own thread.
    pub fn spawn(
        self: &Arc<Self>,
        job: Arc<SnapshotHashJob>,
        snapshot_path: PathBuf,
    ) -> thread::JoinHandle<()> {
        let engine = Arc::clone(self);
        thread::spawn(move || engine.run(&job, &snapshot_path))
    }

    fn execute(&self, job: &SnapshotHashJob, path: &Path) -> Result<Outcome, HashError> {
        let _guard = self.lock.acquire()?;

        let mod_time_before = snapshot_mod_time(path)?;

        if let Some(existing) = provenance::load(path)? {
            if existing.mod_time == mod_time_before {
                if existing.silently_corrupted {
                    // Already known corrupt at this mtime; recomputing
                    // would tell us nothing new.
                    return Ok(Outcome {
                        checksum: existing.checksum,
                        silently_corrupted: true,
                    });
                }
                if !job.rehash() && !existing.checksum.is_empty() {
                    return Ok(Outcome {
                        checksum: existing.checksum,
                        silently_corrupted: false,
                    });
                }
            }
        }

        let checksum = self.compute(job, path)?;

        if let Some(existing) = provenance::load(path)? {
            if existing.mod_time == mod_time_before
                && !existing.checksum.is_empty()
                && existing.checksum != checksum
            {
                warn!(
                    snapshot = %path.display(),
                    recorded = %existing.checksum,
                    computed = %checksum,
                    "snapshot content changed without an mtime change"
                );
                // Keep the recorded checksum: it is the provenance the
                // corruption was detected against.
                let mut record = existing;
                record.silently_corrupted = true;
                if let Err(err) = provenance::store(path, &record) {
                    warn!(snapshot = %path.display(), %err, "failed to persist corruption marker");
                }
                return Ok(Outcome {
                    checksum,
                    silently_corrupted: true,
                });
            }
        }

        provenance::store(
            path,
            &SnapshotHashInfo {
                method: self.method.to_string(),
                checksum: checksum.clone(),
                mod_time: mod_time_before.clone(),
                last_hashed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                silently_corrupted: false,
            },
        )?;

        // The record must never bind a checksum to a stale mtime; a
        // concurrent mutation during the run voids it.
        let mod_time_now = snapshot_mod_time(path)?;
        if mod_time_now != mod_time_before {
            warn!(
                snapshot = %path.display(),
                "snapshot changed while hashing, dropping recorded checksum"
            );
            let _ = provenance::remove(path);
        }

        Ok(Outcome {
            checksum,
            silently_corrupted: false,
        })
    }

    fn compute(&self, job: &SnapshotHashJob, path: &Path) -> Result<String, HashError> {
        let file = File::open(path)?;
        let total = file.metadata()?.len();
        let token = job.cancel_token();
        let mut reader = CancellableReader {
            inner: file,
            cancel: token.clone(),
        };

        let mut hasher = SnapshotHasher::new(self.method);
        let mut buf = vec![0u8; self.block_size];
        let mut hashed = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) if token.is_cancelled() => return Err(HashError::Cancelled),
                Err(err) => return Err(err.into()),
            };
            hasher.update(&buf[..n]);
            hashed += n as u64;
            if total > 0 {
                job.set_progress((100 * hashed / total) as u8);
            }
        }

        job.set_progress(100);
        Ok(hasher.finalize())
    }
}

/// Reader wrapper that polls a shared cancel flag before every read call,
/// not per byte.
struct CancellableReader<R> {
    inner: R,
    cancel: CancelToken,
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "hash job cancelled",
            ));
        }
        self.inner.read(buf)
    }
}
