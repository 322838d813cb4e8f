//! Peer-to-peer MessagePack RPC and stream channel multiplexing.
//!
//! ftlnet connects capture nodes and their consumers over one persistent
//! message-framed socket: control calls travel as RPC, sensor and video
//! data as stream packets demultiplexed per channel.
//!
//! # Crate Structure
//!
//! - [`transport`]: message-framed sockets (in-memory, framed TCP/UDS, WebSocket)
//! - [`proto`]: wire messages, stream packets, channel and codec tables
//! - [`peer`]: connections, handshake, bindings and the connection registry (behind `peer` feature)
//! - [`stream`]: the stream channel multiplexer (behind `stream` feature)

/// Re-export transport types.
pub mod transport {
    pub use ftlnet_transport::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use ftlnet_proto::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use ftlnet_peer::*;
}

/// Re-export stream types (requires `stream` feature).
#[cfg(feature = "stream")]
pub mod stream {
    pub use ftlnet_stream::*;
}
