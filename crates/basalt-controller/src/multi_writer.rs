//! Parallel positioned-operation fan-out.
//!
//! A write (or unmap) against the volume must land on every replica. The
//! fan-out tolerates partial failure: a degraded replica is not
//! catastrophic to the volume, so the call succeeds as long as at least
//! one worker succeeded. The per-worker error set is surfaced so that
//! replica-health management above this layer can react.

use std::fmt;
use std::io;
use std::thread;

use tracing::warn;

use basalt_types::{UnmapperAt, WriterAt};

/// Aggregate of per-worker failures from one fan-out call.
///
/// Carries one entry per failed worker, in input order. Stringifies as the
/// `"; "`-joined individual messages.
#[derive(Debug)]
pub struct MultiWriterError {
    errors: Vec<(usize, io::Error)>,
}

impl MultiWriterError {
    /// The failed workers as `(input index, error)`, in input order.
    pub fn failures(&self) -> &[(usize, io::Error)] {
        &self.errors
    }
}

impl fmt::Display for MultiWriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "unknown");
        }
        for (position, (_, err)) in self.errors.iter().enumerate() {
            if position > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiWriterError {}

/// Fans a positioned operation out to every underlying writer in parallel.
pub struct MultiWriterAt<W> {
    writers: Vec<W>,
}

impl<W> MultiWriterAt<W> {
    pub fn new(writers: Vec<W>) -> Self {
        Self { writers }
    }

    /// Number of underlying writers.
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl<W: Sync> MultiWriterAt<W> {
    /// Issues `op` on every writer concurrently and waits for all of them.
    ///
    /// Returns `Ok(success_len)` if at least one writer succeeded; partial
    /// failures are logged. Returns the aggregate error only when every
    /// writer failed.
    fn fan_out<F>(&self, success_len: usize, op: F) -> Result<usize, MultiWriterError>
    where
        F: Fn(&W) -> io::Result<usize> + Sync,
    {
        if self.writers.is_empty() {
            return Err(MultiWriterError { errors: Vec::new() });
        }

        let results: Vec<io::Result<usize>> = thread::scope(|scope| {
            let op = &op;
            let workers: Vec<_> = self
                .writers
                .iter()
                .map(|writer| scope.spawn(move || op(writer)))
                .collect();
            workers
                .into_iter()
                .map(|worker| match worker.join() {
                    Ok(result) => result,
                    Err(_) => Err(io::Error::other("fan-out worker panicked")),
                })
                .collect()
        });

        let mut successes = 0usize;
        let mut errors = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(_) => successes += 1,
                Err(err) => errors.push((index, err)),
            }
        }

        if successes == 0 {
            return Err(MultiWriterError { errors });
        }
        for (index, err) in &errors {
            warn!(writer = index, %err, "replica operation failed, volume degraded");
        }
        Ok(success_len)
    }
}

impl<W: WriterAt> MultiWriterAt<W> {
    /// Issues `write_at(p, off)` on every writer concurrently; succeeds
    /// with `p.len()` if at least one writer succeeded.
    pub fn write_at(&self, p: &[u8], off: i64) -> Result<usize, MultiWriterError> {
        self.fan_out(p.len(), |writer| writer.write_at(p, off))
    }
}

impl<W: UnmapperAt> MultiWriterAt<W> {
    /// Issues `unmap_at(length, off)` on every writer concurrently, with
    /// the same tolerance as `write_at`.
    pub fn unmap_at(&self, length: u32, off: i64) -> Result<usize, MultiWriterError> {
        self.fan_out(length as usize, |writer| writer.unmap_at(length, off))
    }
}
