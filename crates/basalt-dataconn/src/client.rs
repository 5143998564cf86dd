//! Multiplexed replica client.
//!
//! One connection carries many in-flight operations. Each request gets a
//! fresh sequence number and a one-shot completion channel; a dedicated
//! reader thread routes response frames back to their waiters by `seq`.
//! Writers serialize on the codec's send lock; waiting is otherwise fully
//! concurrent.
//!
//! The reader thread never takes the send lock, so dispatch and completion
//! cannot deadlock.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use basalt_types::{ReaderAt, UnmapperAt, WriterAt};
use basalt_wire::{Message, MessageKind, WireReader, WireWriter};

use crate::error::ClientError;
use crate::transport::Stream;

type Completion = SyncSender<Result<Message, ClientError>>;

enum State {
    Open,
    Closed,
    Failed(String),
}

struct Shared {
    peer: String,
    timeout: Duration,
    next_seq: AtomicU32,
    writer: Mutex<WireWriter<Stream>>,
    control: Stream,
    pending: Mutex<HashMap<u32, Completion>>,
    state: Mutex<State>,
}

/// Client side of one replica connection.
///
/// Cheap to clone; all clones share the connection and its state. The
/// client is terminal once failed: after the first I/O error, timeout or
/// [`set_error`](Self::set_error), every operation returns the latched
/// error without touching the wire.
#[derive(Clone)]
pub struct RemoteClient {
    shared: Arc<Shared>,
}

impl RemoteClient {
    /// Takes ownership of a connected stream and starts the reader thread.
    ///
    /// `timeout` bounds every submitted operation; expiry fails the
    /// operation with [`ClientError::Timeout`] and latches the client.
    pub fn new(stream: Stream, timeout: Duration) -> io::Result<Self> {
        let peer = stream.peer_label();
        let reader = WireReader::new(stream.try_clone()?);
        let control = stream.try_clone()?;

        let shared = Arc::new(Shared {
            peer,
            timeout,
            next_seq: AtomicU32::new(0),
            writer: Mutex::new(WireWriter::new(stream)),
            control,
            pending: Mutex::new(HashMap::new()),
            state: Mutex::new(State::Open),
        });

        let for_reader = Arc::clone(&shared);
        thread::Builder::new()
            .name("replica-client-reader".to_string())
            .spawn(move || run_reader(&for_reader, reader))?;

        Ok(Self { shared })
    }

    /// Reads into `buf` at `offset`; returns the bytes read.
    pub fn read_at(&self, buf: &mut [u8], offset: i64) -> Result<usize, ClientError> {
        let resp = self.submit(MessageKind::Read, offset, buf.len() as u32, Bytes::new())?;
        if resp.data.len() > buf.len() {
            return Err(ClientError::UnexpectedResponse(format!(
                "read returned {} bytes, want at most {}",
                resp.data.len(),
                buf.len()
            )));
        }
        buf[..resp.data.len()].copy_from_slice(&resp.data);
        Ok(resp.data.len())
    }

    /// Writes `buf` at `offset`; returns the bytes written.
    pub fn write_at(&self, buf: &[u8], offset: i64) -> Result<usize, ClientError> {
        let resp = self.submit(
            MessageKind::Write,
            offset,
            buf.len() as u32,
            Bytes::copy_from_slice(buf),
        )?;
        Ok(resp.size as usize)
    }

    /// Unmaps `length` bytes at `offset`; returns the bytes unmapped.
    pub fn unmap_at(&self, length: u32, offset: i64) -> Result<usize, ClientError> {
        let resp = self.submit(MessageKind::Unmap, offset, length, Bytes::new())?;
        Ok(resp.size as usize)
    }

    /// Round-trips a ping frame.
    pub fn ping(&self) -> Result<(), ClientError> {
        self.submit(MessageKind::Ping, 0, 0, Bytes::new())?;
        Ok(())
    }

    /// Latches the client failed with an externally observed error.
    pub fn set_error(&self, error: impl fmt::Display) {
        self.latch(error.to_string());
    }

    /// Closes the connection. Subsequent operations fail with
    /// [`ClientError::Closed`].
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock().expect("client state poisoned");
            if matches!(*state, State::Open) {
                *state = State::Closed;
            }
        }
        if let Err(err) = self.shared.control.shutdown() {
            debug!(peer = %self.shared.peer, %err, "shutdown after close");
        }
    }

    /// True while the client has neither failed nor been closed.
    pub fn is_open(&self) -> bool {
        matches!(
            *self.shared.state.lock().expect("client state poisoned"),
            State::Open
        )
    }

    /// Peer address, for logging.
    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    fn submit(
        &self,
        kind: MessageKind,
        offset: i64,
        size: u32,
        data: Bytes,
    ) -> Result<Message, ClientError> {
        self.check_open()?;

        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::sync_channel(1);
        self.shared
            .pending
            .lock()
            .expect("pending map poisoned")
            .insert(seq, tx);

        let msg = Message::request(seq, kind, offset, size, data);
        {
            let mut writer = self.shared.writer.lock().expect("send lock poisoned");
            if let Err(err) = writer.write_message(&msg) {
                self.shared
                    .pending
                    .lock()
                    .expect("pending map poisoned")
                    .remove(&seq);
                self.latch(err.to_string());
                return Err(err.into());
            }
        }

        match rx.recv_timeout(self.shared.timeout) {
            Ok(Ok(resp)) => {
                if resp.is_error_response() {
                    Err(ClientError::Remote(resp.error_text()))
                } else {
                    Ok(resp)
                }
            }
            Ok(Err(err)) => Err(err),
            Err(RecvTimeoutError::Timeout) => {
                self.shared
                    .pending
                    .lock()
                    .expect("pending map poisoned")
                    .remove(&seq);
                self.latch(format!(
                    "operation seq {seq} timed out after {:?}",
                    self.shared.timeout
                ));
                Err(ClientError::Timeout(self.shared.timeout))
            }
            // The reader dropped the completion without answering; the
            // latched state carries the reason.
            Err(RecvTimeoutError::Disconnected) => Err(self
                .check_open()
                .err()
                .unwrap_or(ClientError::Closed)),
        }
    }

    fn check_open(&self) -> Result<(), ClientError> {
        match &*self.shared.state.lock().expect("client state poisoned") {
            State::Open => Ok(()),
            State::Closed => Err(ClientError::Closed),
            State::Failed(msg) => Err(ClientError::Failed(msg.clone())),
        }
    }

    fn latch(&self, message: String) {
        let mut state = self.shared.state.lock().expect("client state poisoned");
        if matches!(*state, State::Open) {
            warn!(peer = %self.shared.peer, error = %message, "replica client failed");
            *state = State::Failed(message);
        }
    }
}

fn run_reader(shared: &Shared, mut reader: WireReader<Stream>) {
    loop {
        match reader.read_message() {
            Ok(msg) => {
                if !msg.is_response() {
                    warn!(peer = %shared.peer, seq = msg.seq, "request frame from replica, dropping");
                    continue;
                }
                let completion = shared
                    .pending
                    .lock()
                    .expect("pending map poisoned")
                    .remove(&msg.seq);
                match completion {
                    Some(tx) => {
                        // A timed-out waiter may already be gone.
                        let _ = tx.send(Ok(msg));
                    }
                    None => {
                        debug!(peer = %shared.peer, seq = msg.seq, "response for unknown sequence");
                    }
                }
            }
            Err(err) => {
                let latched = {
                    let mut state = shared.state.lock().expect("client state poisoned");
                    match &*state {
                        State::Closed => None,
                        // The first error wins; a later connection drop
                        // must not mask it.
                        State::Failed(existing) => Some(existing.clone()),
                        State::Open => {
                            let message = err.to_string();
                            *state = State::Failed(message.clone());
                            Some(message)
                        }
                    }
                };

                let pending: Vec<Completion> = shared
                    .pending
                    .lock()
                    .expect("pending map poisoned")
                    .drain()
                    .map(|(_, tx)| tx)
                    .collect();
                for tx in pending {
                    let _ = tx.send(Err(match &latched {
                        Some(message) => ClientError::Failed(message.clone()),
                        None => ClientError::Closed,
                    }));
                }

                match latched {
                    Some(message) => {
                        warn!(peer = %shared.peer, error = %message, "replica connection lost");
                    }
                    None => debug!(peer = %shared.peer, "reader exiting after close"),
                }
                return;
            }
        }
    }
}

impl ReaderAt for RemoteClient {
    fn read_at(&self, buf: &mut [u8], offset: i64) -> io::Result<usize> {
        RemoteClient::read_at(self, buf, offset).map_err(Into::into)
    }
}

impl WriterAt for RemoteClient {
    fn write_at(&self, buf: &[u8], offset: i64) -> io::Result<usize> {
        RemoteClient::write_at(self, buf, offset).map_err(Into::into)
    }
}

impl UnmapperAt for RemoteClient {
    fn unmap_at(&self, length: u32, offset: i64) -> io::Result<usize> {
        RemoteClient::unmap_at(self, length, offset).map_err(Into::into)
    }
}
