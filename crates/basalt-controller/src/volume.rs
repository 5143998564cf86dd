//! Engine-side volume: N replica clients behind one block-device surface.

use std::io;

use tracing::info;

use basalt_dataconn::RemoteClient;
use basalt_types::{ReaderAt, UnmapperAt, WriterAt};

use crate::multi_writer::MultiWriterAt;

/// One attached volume.
///
/// Owns a client per replica and implements the
/// [`basalt_types::ReaderWriterUnmapperAt`] capability the frontend
/// consumes: reads come from the first replica still in `Open` state,
/// writes and unmaps fan out to every open replica in parallel.
pub struct Volume {
    name: String,
    replicas: Vec<RemoteClient>,
}

impl Volume {
    pub fn new(name: impl Into<String>, replicas: Vec<RemoteClient>) -> Self {
        let volume = Self {
            name: name.into(),
            replicas,
        };
        info!(volume = %volume.name, replicas = volume.replicas.len(), "volume assembled");
        volume
    }

    /// The volume name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clients of replicas that have not failed or been closed.
    fn open_replicas(&self) -> Vec<RemoteClient> {
        self.replicas
            .iter()
            .filter(|client| client.is_open())
            .cloned()
            .collect()
    }

    /// Number of replicas still open.
    pub fn healthy_replica_count(&self) -> usize {
        self.replicas.iter().filter(|c| c.is_open()).count()
    }

    /// Closes every replica client.
    pub fn close(&self) {
        for client in &self.replicas {
            client.close();
        }
        info!(volume = %self.name, "volume closed");
    }
}

impl ReaderAt for Volume {
    fn read_at(&self, buf: &mut [u8], offset: i64) -> io::Result<usize> {
        for client in &self.replicas {
            if client.is_open() {
                return client.read_at(buf, offset).map_err(Into::into);
            }
        }
        Err(io::Error::other(format!(
            "volume {}: no open replica to read from",
            self.name
        )))
    }
}

impl WriterAt for Volume {
    fn write_at(&self, buf: &[u8], offset: i64) -> io::Result<usize> {
        let open = self.open_replicas();
        if open.is_empty() {
            return Err(io::Error::other(format!(
                "volume {}: no open replica to write to",
                self.name
            )));
        }
        MultiWriterAt::new(open)
            .write_at(buf, offset)
            .map_err(io::Error::other)
    }
}

impl UnmapperAt for Volume {
    fn unmap_at(&self, length: u32, offset: i64) -> io::Result<usize> {
        let open = self.open_replicas();
        if open.is_empty() {
            return Err(io::Error::other(format!(
                "volume {}: no open replica to unmap on",
                self.name
            )));
        }
        MultiWriterAt::new(open)
            .unmap_at(length, offset)
            .map_err(io::Error::other)
    }
}
