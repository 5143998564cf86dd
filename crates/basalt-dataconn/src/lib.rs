//! # basalt-dataconn: Replica data-plane RPC
//!
//! One [`RemoteClient`] per replica carries positioned reads, writes,
//! unmaps and pings over a single full-duplex connection, multiplexed by a
//! per-request sequence number. On the replica side, a [`DataServer`]
//! accepts connections and serves each against the on-disk store through
//! the [`basalt_types::ReaderWriterUnmapperAt`] capability.
//!
//! The client enforces a per-operation deadline and latches itself failed
//! on the first transport error or timeout: a failed client rejects all
//! further operations with the latched error without touching the wire.

mod client;
mod error;
mod server;
mod transport;

pub use client::RemoteClient;
pub use error::ClientError;
pub use server::{DataServer, serve_connection};
pub use transport::{Endpoint, Listener, Stream};
