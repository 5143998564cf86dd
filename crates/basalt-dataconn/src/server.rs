//! Replica-side data server.
//!
//! Accepts stream connections and serves each on its own thread against
//! the on-disk store. Responses to one connection serialize on a send
//! lock; a malformed frame terminates that connection only.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::Bytes;
use tracing::{error, info, warn};

use basalt_types::ReaderWriterUnmapperAt;
use basalt_wire::{Message, MessageKind, WireReader, WireWriter};

use crate::transport::{Endpoint, Listener, Stream};

/// Data-plane server for one replica store.
pub struct DataServer<S> {
    listener: Listener,
    store: Arc<S>,
}

impl<S: ReaderWriterUnmapperAt + 'static> DataServer<S> {
    /// Binds the endpoint without accepting yet.
    pub fn bind(endpoint: &Endpoint, store: Arc<S>) -> io::Result<Self> {
        let listener = Listener::bind(endpoint)?;
        Ok(Self { listener, store })
    }

    /// The endpoint actually bound (resolves port 0).
    pub fn local_endpoint(&self) -> io::Result<Endpoint> {
        self.listener.local_endpoint()
    }

    /// Accepts connections forever, serving each on its own thread.
    pub fn listen_and_serve(&self) -> io::Result<()> {
        loop {
            let stream = match self.listener.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    error!(%err, "failed to accept connection");
                    continue;
                }
            };

            info!(peer = %stream.peer_label(), "new data connection");

            let store = Arc::clone(&self.store);
            thread::Builder::new()
                .name("data-server-conn".to_string())
                .spawn(move || {
                    if let Err(err) = serve_connection(stream, store.as_ref()) {
                        warn!(%err, "data connection ended");
                    }
                })?;
        }
    }
}

/// Serves one connection until it closes or a frame fails to decode.
pub fn serve_connection<S: ReaderWriterUnmapperAt + ?Sized>(
    stream: Stream,
    store: &S,
) -> io::Result<()> {
    let peer = stream.peer_label();
    let mut reader = WireReader::new(stream.try_clone()?);
    let writer = Mutex::new(WireWriter::new(stream));

    loop {
        let request = match reader.read_message() {
            Ok(msg) => msg,
            Err(basalt_wire::WireError::ShortRead(_)) => {
                info!(peer = %peer, "data connection closed");
                return Ok(());
            }
            Err(err) => {
                return Err(io::Error::other(err.to_string()));
            }
        };

        let response = handle_request(&request, store);
        writer
            .lock()
            .expect("send lock poisoned")
            .write_message(&response)
            .map_err(|err| io::Error::other(err.to_string()))?;
    }
}

fn handle_request<S: ReaderWriterUnmapperAt + ?Sized>(request: &Message, store: &S) -> Message {
    if request.is_response() {
        return Message::error_response_to(request, "unexpected response frame");
    }
    if request.offset < 0 {
        return Message::error_response_to(request, "negative offset");
    }

    match request.kind() {
        Some(MessageKind::Read) => {
            let mut buf = vec![0u8; request.size as usize];
            match store.read_at(&mut buf, request.offset) {
                Ok(n) => {
                    buf.truncate(n);
                    Message::response_to(request, n as u32, Bytes::from(buf))
                }
                Err(err) => Message::error_response_to(request, &err.to_string()),
            }
        }
        Some(MessageKind::Write) => match store.write_at(&request.data, request.offset) {
            Ok(n) => Message::response_to(request, n as u32, Bytes::new()),
            Err(err) => Message::error_response_to(request, &err.to_string()),
        },
        Some(MessageKind::Unmap) => match store.unmap_at(request.size, request.offset) {
            Ok(n) => Message::response_to(request, n as u32, Bytes::new()),
            Err(err) => Message::error_response_to(request, &err.to_string()),
        },
        Some(MessageKind::Ping) => Message::response_to(request, 0, Bytes::new()),
        Some(MessageKind::Error) | None => {
            Message::error_response_to(request, "unknown message type")
        }
    }
}
