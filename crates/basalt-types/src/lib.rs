//! # basalt-types: Core types for Basalt
//!
//! This crate contains the shared types used across the Basalt data plane:
//! - Positioned I/O capability traits ([`ReaderAt`], [`WriterAt`],
//!   [`UnmapperAt`] and their combinations)
//! - Job lifecycle states ([`ProgressState`])
//! - Frontend lifecycle state ([`FrontendState`])
//! - Replica volume metadata ([`VolumeInfo`])
//!
//! Everything here is deliberately small: the crates that do real work
//! (dataconn, controller, hash, backup) all meet at these seams.

mod progress;
mod traits;
mod volume;

pub use progress::{FrontendState, ProgressState};
pub use traits::{ReaderAt, ReaderWriterAt, ReaderWriterUnmapperAt, UnmapperAt, WriterAt};
pub use volume::{VOLUME_META_FILE, VolumeInfo, VolumeMetaError};
