use std::time::Duration;

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ftlnet_transport::TransportError),

    /// Wire encoding or message shape error.
    #[error("protocol error: {0}")]
    Proto(#[from] ftlnet_proto::ProtoError),

    /// Handshake rejected (bad magic or malformed arguments).
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The connection closed before the operation completed.
    #[error("peer disconnected")]
    Disconnected,

    /// The remote handler reported an error in the response.
    #[error("remote error: {0}")]
    Remote(String),

    /// Caller-supplied value could not be used.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Caller-imposed deadline expired.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, PeerError>;
