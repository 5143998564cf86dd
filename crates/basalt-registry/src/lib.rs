//! # basalt-registry: Bounded job registries
//!
//! Tracks in-flight and recently finished jobs (backups, snapshot hashes)
//! in insertion order, with FIFO-style retention: for each tracked terminal
//! class, only the K most recently added terminal entries are kept; older
//! terminal entries are trimmed on the next mutation. Non-terminal entries
//! are never trimmed.
//!
//! Callers hold `Arc` observers of live job objects; a job's fields may
//! keep transitioning while an observer is held. The job object itself is
//! destroyed only when its entry is trimmed or deleted and the last
//! observer drops.

mod registry;

pub use registry::{Registry, RegistryError, RetainedJob};
