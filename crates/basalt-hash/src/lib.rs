//! # basalt-hash: Snapshot integrity subsystem
//!
//! Hashes snapshot disk files and records the result as provenance in an
//! extended attribute on the file itself. Re-hashing against the recorded
//! checksum detects silent corruption: content that changed on disk while
//! the mtime did not.
//!
//! Hashing is serialized node-wide through a blocking advisory file lock,
//! so at most one hash job runs per node regardless of which process
//! started it. Jobs are tracked in a bounded [`SnapshotHashList`] registry
//! keeping the ten most recent completed and failed jobs each.

mod engine;
mod error;
mod job;
mod lock;
pub mod provenance;

pub use engine::{DEFAULT_BLOCK_SIZE, HashEngine, snapshot_mod_time};
pub use error::HashError;
pub use job::{CancelToken, SnapshotHashJob, SnapshotHashStatus};
pub use lock::{HASH_LOCK_FILE, HashLock, HashLockGuard};

/// Bounded registry of hash jobs keyed by snapshot name.
pub type SnapshotHashList = basalt_registry::Registry<SnapshotHashJob>;

/// Retained completed and failed hash jobs, per state.
pub const MAX_SNAPSHOT_HASH_JOBS: usize = 10;
