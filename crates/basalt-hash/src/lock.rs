//! Node-wide hash lock.
//!
//! A single well-known lock file under the node's persistent lock
//! directory, taken with a blocking exclusive advisory lock. At most one
//! hash job runs per node at a time, regardless of which process started
//! it. The lock releases on all exit paths through the guard's `Drop`.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::HashError;

/// File name of the hash lock inside the lock directory.
pub const HASH_LOCK_FILE: &str = "snapshot-hash.lock";

/// Handle to the well-known lock file path.
#[derive(Debug, Clone)]
pub struct HashLock {
    path: PathBuf,
}

impl HashLock {
    /// Addresses the lock file inside `lock_dir`.
    pub fn new(lock_dir: impl AsRef<Path>) -> Self {
        Self {
            path: lock_dir.as_ref().join(HASH_LOCK_FILE),
        }
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until the exclusive lock is held.
    ///
    /// Fails with [`HashError::LockUnavailable`] when the lock directory
    /// cannot be created or the lock cannot be taken.
    pub fn acquire(&self) -> Result<HashLockGuard, HashError> {
        let unavailable = |source: std::io::Error| HashError::LockUnavailable {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(unavailable)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(unavailable)?;

        file.lock_exclusive().map_err(unavailable)?;
        debug!(path = %self.path.display(), "acquired snapshot hash lock");

        Ok(HashLockGuard {
            file,
            path: self.path.clone(),
        })
    }
}

/// Held lock; releases on drop.
#[derive(Debug)]
pub struct HashLockGuard {
    file: fs::File,
    path: PathBuf,
}

impl Drop for HashLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "released snapshot hash lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let lock = HashLock::new(dir.path());

        let guard = lock.acquire().unwrap();
        assert!(lock.path().exists());
        drop(guard);

        // Reacquirable after release.
        let _guard = lock.acquire().unwrap();
    }

    #[test]
    fn creates_missing_lock_directory() {
        let dir = TempDir::new().unwrap();
        let lock = HashLock::new(dir.path().join("nested/locks"));

        let _guard = lock.acquire().unwrap();

        assert!(dir.path().join("nested/locks").is_dir());
    }

    #[test]
    fn holders_are_mutually_exclusive() {
        let dir = TempDir::new().unwrap();
        let lock = HashLock::new(dir.path());
        let holders = Arc::new(AtomicUsize::new(0));

        thread::scope(|scope| {
            for _ in 0..4 {
                let lock = lock.clone();
                let holders = Arc::clone(&holders);
                scope.spawn(move || {
                    let _guard = lock.acquire().unwrap();
                    let concurrent = holders.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(concurrent, 0, "lock windows overlapped");
                    thread::sleep(Duration::from_millis(20));
                    holders.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
    }
}
