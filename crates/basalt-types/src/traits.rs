//! Positioned I/O capability traits.
//!
//! These are the seams between the engine core and its collaborators: the
//! frontend consumes [`ReaderWriterUnmapperAt`] from the volume, the volume
//! consumes it from each replica client, and the replica-side data server
//! consumes it from the on-disk replica store.
//!
//! Offsets are `i64` to match the wire format; implementations reject
//! negative offsets.

use std::io;

/// Positioned reads.
pub trait ReaderAt: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read.
    fn read_at(&self, buf: &mut [u8], offset: i64) -> io::Result<usize>;
}

/// Positioned writes.
pub trait WriterAt: Send + Sync {
    /// Writes `buf` starting at `offset`.
    ///
    /// Returns the number of bytes written.
    fn write_at(&self, buf: &[u8], offset: i64) -> io::Result<usize>;
}

/// Positioned unmap (hole punching / discard).
pub trait UnmapperAt: Send + Sync {
    /// Unmaps `length` bytes starting at `offset`.
    ///
    /// Returns the number of bytes unmapped.
    fn unmap_at(&self, length: u32, offset: i64) -> io::Result<usize>;
}

/// Combined read/write capability.
pub trait ReaderWriterAt: ReaderAt + WriterAt {}

impl<T: ReaderAt + WriterAt + ?Sized> ReaderWriterAt for T {}

/// Full block-device capability: read, write and unmap.
pub trait ReaderWriterUnmapperAt: ReaderAt + WriterAt + UnmapperAt {}

impl<T: ReaderAt + WriterAt + UnmapperAt + ?Sized> ReaderWriterUnmapperAt for T {}

impl<T: ReaderAt + ?Sized> ReaderAt for std::sync::Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: i64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl<T: ReaderAt + ?Sized> ReaderAt for Box<T> {
    fn read_at(&self, buf: &mut [u8], offset: i64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl<T: WriterAt + ?Sized> WriterAt for Box<T> {
    fn write_at(&self, buf: &[u8], offset: i64) -> io::Result<usize> {
        (**self).write_at(buf, offset)
    }
}

impl<T: UnmapperAt + ?Sized> UnmapperAt for Box<T> {
    fn unmap_at(&self, length: u32, offset: i64) -> io::Result<usize> {
        (**self).unmap_at(length, offset)
    }
}

impl<T: WriterAt + ?Sized> WriterAt for std::sync::Arc<T> {
    fn write_at(&self, buf: &[u8], offset: i64) -> io::Result<usize> {
        (**self).write_at(buf, offset)
    }
}

impl<T: UnmapperAt + ?Sized> UnmapperAt for std::sync::Arc<T> {
    fn unmap_at(&self, length: u32, offset: i64) -> io::Result<usize> {
        (**self).unmap_at(length, offset)
    }
}
