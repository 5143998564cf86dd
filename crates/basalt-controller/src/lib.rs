//! # basalt-controller: Engine core
//!
//! Wires the pieces of the write path together: a [`Volume`] owns one
//! [`basalt_dataconn::RemoteClient`] per replica and exposes the
//! block-device capability to a [`Frontend`]. Writes and unmaps fan out to
//! every open replica in parallel through [`MultiWriterAt`]; reads are
//! served from the first open replica.

mod frontend;
mod multi_writer;
mod volume;

pub use frontend::{DeviceCreator, DeviceService, Frontend, FrontendError, Tgt, Ublk};
pub use multi_writer::{MultiWriterAt, MultiWriterError};
pub use volume::Volume;
