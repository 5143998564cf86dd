//! Client error types.

use std::time::Duration;

use basalt_wire::WireError;
use thiserror::Error;

/// Errors surfaced by [`crate::RemoteClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The per-operation deadline expired. Latches the client failed.
    #[error("replica operation timed out after {0:?}")]
    Timeout(Duration),

    /// The client was closed with [`crate::RemoteClient::close`].
    #[error("replica client is closed")]
    Closed,

    /// The client latched failed earlier; carries the first error.
    #[error("replica client failed: {0}")]
    Failed(String),

    /// The replica answered this operation with an error. Does not latch
    /// the client: the transport is still healthy.
    #[error("replica error: {0}")]
    Remote(String),

    /// The response frame was malformed for the request it answers.
    #[error("unexpected replica response: {0}")]
    UnexpectedResponse(String),

    /// Frame codec failure. Latches the client failed.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Transport failure. Latches the client failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ClientError> for std::io::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout(_) => Self::new(std::io::ErrorKind::TimedOut, err.to_string()),
            ClientError::Io(inner) => inner,
            other => Self::other(other.to_string()),
        }
    }
}
