/// Errors that can occur in stream operations.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Connection-level error.
    #[error("peer error: {0}")]
    Peer(#[from] ftlnet_peer::PeerError),

    /// Payload encoding error.
    #[error("protocol error: {0}")]
    Proto(#[from] ftlnet_proto::ProtoError),

    /// The multiplexer stopped before the operation completed.
    #[error("stream stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, StreamError>;
