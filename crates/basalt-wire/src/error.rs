//! Wire protocol error types.

use thiserror::Error;

/// Errors from the frame codec.
#[derive(Debug, Error)]
pub enum WireError {
    /// The frame's magic bytes did not match [`crate::MAGIC_VERSION`].
    #[error("wrong magic version received: {0:#06x}")]
    ProtocolVersion(u16),

    /// The stream ended inside a frame.
    #[error("short read: {0}")]
    ShortRead(std::io::Error),

    /// The header announced an implausibly large payload.
    #[error("frame payload of {0} bytes exceeds limit")]
    DataTooLarge(u32),

    /// Any other transport error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
