//! Message-framed socket abstraction for ftlnet.
//!
//! The RPC layer needs an ordered, reliable transport that preserves
//! message boundaries. This crate provides that as a [`Socket`]:
//! - an in-memory connected pair ([`Socket::pair`]) for tests and
//!   in-process wiring
//! - length-prefixed framing over TCP and Unix domain sockets
//! - WebSocket binary frames (behind the `websocket` feature)
//!
//! Every transport is driven by one background task; callers only ever
//! see [`SocketWriter`] and [`SocketReader`].

pub mod codec;
pub mod error;
pub mod framed;
pub mod socket;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use codec::{decode_frame, encode_frame, FrameCodec, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{Result, TransportError};
pub use framed::{connect_tcp, FramedListener};
#[cfg(unix)]
pub use framed::connect_unix;
pub use socket::{SentCallback, Socket, SocketEvent, SocketReader, SocketWriter};
