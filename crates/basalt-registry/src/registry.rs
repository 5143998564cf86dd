//! Generic bounded registry keyed by job name.

use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The caller passed an empty key.
    #[error("job key is required")]
    InvalidArgument,

    /// A non-terminal job with the same key is already registered.
    #[error("job {key} is in progress")]
    Conflict { key: String },

    /// No entry with the given key.
    #[error("job {key} is not found")]
    NotFound { key: String },
}

/// Retention behavior of a registered job.
///
/// A job reports which retention class it currently occupies, if any:
/// classes partition the terminal states the registry bounds (for hash
/// jobs, `Complete` and `Error` are independent classes; for backups only
/// the finished class is tracked). `is_terminal` governs the add-conflict
/// rule and may be true for jobs outside every retention class; such jobs
/// stay until explicitly deleted.
pub trait RetainedJob {
    /// Number of distinct retention classes this job kind uses.
    const RETENTION_CLASSES: usize;

    /// The retention class this job currently occupies, if terminal and
    /// tracked. Must be `< Self::RETENTION_CLASSES`.
    fn retention_class(&self) -> Option<usize>;

    /// True once the job can never transition again.
    fn is_terminal(&self) -> bool;
}

struct Entry<J> {
    key: String,
    job: Arc<J>,
}

/// Ordered job table with per-class FIFO retention.
pub struct Registry<J> {
    entries: Mutex<Vec<Entry<J>>>,
    keep: usize,
}

impl<J: RetainedJob> Registry<J> {
    /// Creates a registry keeping at most `keep` entries per retention
    /// class.
    pub fn new(keep: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            keep,
        }
    }

    /// Registers a job under `key` and trims old terminal entries.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidArgument`] for an empty key.
    /// - [`RegistryError::Conflict`] when a non-terminal job already holds
    ///   the key. A terminal holder is replaced.
    pub fn add(&self, key: &str, job: Arc<J>) -> Result<(), RegistryError> {
        if key.is_empty() {
            return Err(RegistryError::InvalidArgument);
        }

        let mut entries = self.entries.lock().expect("registry mutex poisoned");

        if let Some(index) = entries.iter().position(|e| e.key == key) {
            if !entries[index].job.is_terminal() {
                return Err(RegistryError::Conflict {
                    key: key.to_string(),
                });
            }
            entries.remove(index);
        }

        entries.push(Entry {
            key: key.to_string(),
            job,
        });

        Self::refresh(&mut entries, self.keep);
        Ok(())
    }

    /// Returns a shared observer of the job under `key`.
    ///
    /// Triggers a retention pass first, like `add`.
    pub fn get(&self, key: &str) -> Result<Arc<J>, RegistryError> {
        if key.is_empty() {
            return Err(RegistryError::InvalidArgument);
        }

        let mut entries = self.entries.lock().expect("registry mutex poisoned");
        Self::refresh(&mut entries, self.keep);

        entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| Arc::clone(&e.job))
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_string(),
            })
    }

    /// Removes the entry under `key`.
    pub fn delete(&self, key: &str) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().expect("registry mutex poisoned");

        match entries.iter().position(|e| e.key == key) {
            Some(index) => {
                entries.remove(index);
                Ok(())
            }
            None => Err(RegistryError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry mutex poisoned").len()
    }

    /// True when no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all entries, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("registry mutex poisoned")
            .iter()
            .map(|e| e.key.clone())
            .collect()
    }

    /// Trims, per retention class, every terminal entry older than the
    /// `keep` most recent ones in that class.
    ///
    /// Collects the indices to drop first, then rebuilds the list in
    /// order, so no index arithmetic runs against a mutating list.
    fn refresh(entries: &mut Vec<Entry<J>>, keep: usize) {
        let mut drop_marks = vec![false; entries.len()];

        for class in 0..J::RETENTION_CLASSES {
            let mut seen = 0usize;
            for (index, entry) in entries.iter().enumerate().rev() {
                if entry.job.retention_class() != Some(class) {
                    continue;
                }
                if seen < keep {
                    seen += 1;
                } else {
                    drop_marks[index] = true;
                }
            }
        }

        if drop_marks.iter().any(|&marked| marked) {
            let mut index = 0;
            entries.retain(|_| {
                let keep_entry = !drop_marks[index];
                index += 1;
                keep_entry
            });
        }
    }
}
