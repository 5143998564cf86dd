//! Frame codec over buffered byte streams.
//!
//! The writer buffers so that the 26-byte header and its payload coalesce
//! into one transport write, then flushes per frame. The reader consumes
//! exactly one frame per call with `read_exact`.

use std::io::{BufReader, BufWriter, Read, Write};

use bytes::Bytes;

use crate::error::WireError;
use crate::message::{HEADER_SIZE, MAGIC_VERSION, MAX_DATA_LEN, Message};

const READ_BUFFER_SIZE: usize = 64 * 1024;
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Reading half of a wire connection.
pub struct WireReader<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> WireReader<R> {
    /// Wraps the reading half of a stream.
    pub fn new(stream: R) -> Self {
        Self {
            inner: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
        }
    }

    /// Reads one frame.
    ///
    /// # Errors
    ///
    /// - [`WireError::ProtocolVersion`] when the magic bytes mismatch; the
    ///   stream is positioned just past the offending header.
    /// - [`WireError::ShortRead`] when the stream ends inside a frame.
    pub fn read_message(&mut self) -> Result<Message, WireError> {
        let mut header = [0u8; HEADER_SIZE];
        read_full(&mut self.inner, &mut header)?;

        let magic_version = u16::from_le_bytes([header[0], header[1]]);
        let seq = u32::from_le_bytes(field(&header, 2));
        let msg_type = u32::from_le_bytes(field(&header, 6));
        let offset = i64::from_le_bytes(field(&header, 10));
        let size = u32::from_le_bytes(field(&header, 18));
        let data_len = u32::from_le_bytes(field(&header, 22));

        if magic_version != MAGIC_VERSION {
            return Err(WireError::ProtocolVersion(magic_version));
        }
        if data_len > MAX_DATA_LEN {
            return Err(WireError::DataTooLarge(data_len));
        }

        let data = if data_len > 0 {
            let mut payload = vec![0u8; data_len as usize];
            read_full(&mut self.inner, &mut payload)?;
            Bytes::from(payload)
        } else {
            Bytes::new()
        };

        Ok(Message {
            magic_version,
            seq,
            msg_type,
            offset,
            size,
            data,
        })
    }
}

/// Writing half of a wire connection.
pub struct WireWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> WireWriter<W> {
    /// Wraps the writing half of a stream.
    pub fn new(stream: W) -> Self {
        Self {
            inner: BufWriter::with_capacity(WRITE_BUFFER_SIZE, stream),
        }
    }

    /// Serializes one frame and flushes it.
    pub fn write_message(&mut self, msg: &Message) -> Result<(), WireError> {
        let mut header = [0u8; HEADER_SIZE];
        header[0..2].copy_from_slice(&msg.magic_version.to_le_bytes());
        header[2..6].copy_from_slice(&msg.seq.to_le_bytes());
        header[6..10].copy_from_slice(&msg.msg_type.to_le_bytes());
        header[10..18].copy_from_slice(&msg.offset.to_le_bytes());
        header[18..22].copy_from_slice(&msg.size.to_le_bytes());
        header[22..26].copy_from_slice(&(msg.data.len() as u32).to_le_bytes());

        self.inner.write_all(&header)?;
        if !msg.data.is_empty() {
            self.inner.write_all(&msg.data)?;
        }
        self.inner.flush()?;
        Ok(())
    }
}

fn field<const N: usize>(header: &[u8; HEADER_SIZE], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&header[at..at + N]);
    out
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), WireError> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            WireError::ShortRead(err)
        } else {
            WireError::Io(err)
        }
    })
}
