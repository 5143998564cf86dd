//! Frame layout and message kinds.

use bytes::Bytes;

/// Protocol magic, first two bytes of every frame.
pub const MAGIC_VERSION: u16 = 0x1B7C;

/// Fixed header width in bytes.
pub const HEADER_SIZE: usize = 26;

/// Bit set on the `type` field of every response frame.
pub const RESPONSE_FLAG: u32 = 0x8000_0000;

/// Upper bound on a frame payload. A `data_len` beyond this is treated as a
/// corrupt header rather than an allocation request.
pub const MAX_DATA_LEN: u32 = 1 << 25;

/// Operation kinds carried in the `type` field.
///
/// Requests use the bare discriminant; the matching response sets
/// [`RESPONSE_FLAG`]. `Error` only ever appears as a response, carrying the
/// error text as its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageKind {
    Read = 1,
    Write = 2,
    Unmap = 3,
    Ping = 4,
    Error = 5,
}

impl MessageKind {
    /// Decodes a kind from a `type` field with [`RESPONSE_FLAG`] stripped.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Read),
            2 => Some(Self::Write),
            3 => Some(Self::Unmap),
            4 => Some(Self::Ping),
            5 => Some(Self::Error),
            _ => None,
        }
    }
}

/// One wire frame.
///
/// `size` is the logical operation length (bytes to read, write or unmap);
/// `data` is the payload (write request contents, read response contents,
/// or error response text). The two are distinct: a read request has
/// `size > 0` and an empty payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub magic_version: u16,
    pub seq: u32,
    pub msg_type: u32,
    pub offset: i64,
    pub size: u32,
    pub data: Bytes,
}

impl Message {
    /// Builds a request frame.
    pub fn request(seq: u32, kind: MessageKind, offset: i64, size: u32, data: Bytes) -> Self {
        Self {
            magic_version: MAGIC_VERSION,
            seq,
            msg_type: kind as u32,
            offset,
            size,
            data,
        }
    }

    /// Builds the success response to `request`, carrying `data`.
    pub fn response_to(request: &Message, size: u32, data: Bytes) -> Self {
        Self {
            magic_version: MAGIC_VERSION,
            seq: request.seq,
            msg_type: request.msg_type | RESPONSE_FLAG,
            offset: request.offset,
            size,
            data,
        }
    }

    /// Builds the error response to `request`, carrying the error text.
    pub fn error_response_to(request: &Message, error: &str) -> Self {
        Self {
            magic_version: MAGIC_VERSION,
            seq: request.seq,
            msg_type: MessageKind::Error as u32 | RESPONSE_FLAG,
            offset: request.offset,
            size: 0,
            data: Bytes::copy_from_slice(error.as_bytes()),
        }
    }

    /// True if [`RESPONSE_FLAG`] is set.
    pub fn is_response(&self) -> bool {
        self.msg_type & RESPONSE_FLAG != 0
    }

    /// The operation kind with the response flag stripped, if recognized.
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_u32(self.msg_type & !RESPONSE_FLAG)
    }

    /// True for an error response frame.
    pub fn is_error_response(&self) -> bool {
        self.is_response() && self.kind() == Some(MessageKind::Error)
    }

    /// The payload decoded as error text (for error responses).
    pub fn error_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}
