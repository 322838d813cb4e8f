//! Bidirectional MessagePack RPC over a message-framed socket.
//!
//! A [`Connection`] owns one socket. After a handshake exchanging 128-bit
//! peer ids, either side may bind procedures, call the other side's
//! procedures, send notifications, or proxy calls on to a third party.
//! Handshaken connections are tracked in a [`ConnectionRegistry`], which
//! also drives periodic byte-rate statistics.

pub mod connection;
pub mod connector;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod listener;
pub mod procedures;
pub mod registry;
pub mod stats;

pub use connection::{Connection, ConnectionConfig, ConnectionEvent, ConnectionState};
pub use connector::{connect_tcp, connect_tcp_with_config};
#[cfg(unix)]
pub use connector::connect_unix;
#[cfg(feature = "websocket")]
pub use connector::connect_websocket;
pub use error::{PeerError, Result};
pub use handler::{HandlerError, HandlerResult, Responder};
pub use handshake::{Handshake, HandshakeConfig, PeerId, HANDSHAKE_MAGIC, PROTOCOL_VERSION};
pub use listener::PeerListener;
pub use procedures::{DISABLE_STREAM, ENABLE_STREAM, HANDSHAKE, PING};
pub use registry::{ConnectionRegistry, RegistryConfig};
pub use stats::Statistics;
