/// Errors that can occur while encoding or decoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// MessagePack serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The bytes are not a valid MessagePack value.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A complete value was decoded but bytes remained.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// The value is not one of the known wire message shapes.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The value is not a well-formed stream or data packet.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// Typed conversion to or from a dynamic value failed.
    #[error("value conversion failed: {0}")]
    Convert(#[from] rmpv::ext::Error),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
