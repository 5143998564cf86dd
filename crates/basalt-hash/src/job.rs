//! Hash job state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use basalt_registry::RetainedJob;
use basalt_types::ProgressState;

/// Cooperative cancellation flag, polled between read chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token. Irreversible.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pollable status of one hash job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotHashStatus {
    pub state: ProgressState,
    pub progress: u8,
    pub checksum: String,
    pub error: String,
    pub silently_corrupted: bool,
}

/// One hash job against one snapshot.
///
/// Owned by the [`crate::SnapshotHashList`] registry; callers observe it
/// through shared references whose status keeps transitioning until the
/// job reaches a terminal state. The terminal state is set exactly once
/// under the status lock.
pub struct SnapshotHashJob {
    snapshot_name: String,
    rehash: bool,
    cancel: CancelToken,
    status: Mutex<SnapshotHashStatus>,
}

impl SnapshotHashJob {
    /// Creates a job in `InProgress` state.
    pub fn new(snapshot_name: impl Into<String>, rehash: bool) -> Arc<Self> {
        Arc::new(Self {
            snapshot_name: snapshot_name.into(),
            rehash,
            cancel: CancelToken::new(),
            status: Mutex::new(SnapshotHashStatus {
                state: ProgressState::InProgress,
                progress: 0,
                checksum: String::new(),
                error: String::new(),
                silently_corrupted: false,
            }),
        })
    }

    pub fn snapshot_name(&self) -> &str {
        &self.snapshot_name
    }

    /// Whether a matching cached checksum should be recomputed anyway.
    pub fn rehash(&self) -> bool {
        self.rehash
    }

    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// A point-in-time copy of the status.
    pub fn status(&self) -> SnapshotHashStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    /// Status as the stable tooling JSON shape.
    pub fn status_json(&self) -> serde_json::Value {
        serde_json::to_value(self.status()).expect("status serializes")
    }

    pub(crate) fn set_progress(&self, progress: u8) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if status.state == ProgressState::InProgress {
            status.progress = progress.min(100);
        }
    }

    /// Records the successful terminal state. Normally driven by the
    /// engine; first terminal transition wins.
    pub fn complete(&self, checksum: String, silently_corrupted: bool) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if status.state != ProgressState::InProgress {
            warn!(snapshot = %self.snapshot_name, "ignoring transition on finished hash job");
            return;
        }
        status.state = ProgressState::Complete;
        status.progress = 100;
        status.checksum = checksum;
        status.silently_corrupted = silently_corrupted;
    }

    /// Records the failed terminal state. Normally driven by the engine;
    /// first terminal transition wins.
    pub fn fail(&self, error: String) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if status.state != ProgressState::InProgress {
            warn!(snapshot = %self.snapshot_name, "ignoring transition on finished hash job");
            return;
        }
        status.state = ProgressState::Error;
        status.error = error;
    }
}

impl RetainedJob for SnapshotHashJob {
    // Complete and Error are retained independently.
    const RETENTION_CLASSES: usize = 2;

    fn retention_class(&self) -> Option<usize> {
        match self.status.lock().expect("status lock poisoned").state {
            ProgressState::InProgress => None,
            ProgressState::Complete => Some(0),
            ProgressState::Error => Some(1),
        }
    }

    fn is_terminal(&self) -> bool {
        self.status
            .lock()
            .expect("status lock poisoned")
            .state
            .is_terminal()
    }
}
