//! Wire-level protocol types for ftlnet.
//!
//! Every socket message is one MessagePack array. Three shapes exist:
//! - `[0, name, args]` notification
//! - `[0, call_id, name, args]` call
//! - `[1, call_id, error, result]` response
//!
//! Stream traffic rides on top of these as `(latency, StreamPacket,
//! DataPacket)` argument triples addressed to a resource URI.

pub mod channel;
pub mod codec;
pub mod codecs;
pub mod error;
pub mod message;
pub mod packet;

pub use channel::{channel_from_name, channel_name, is_data, is_metadata, is_video, ChannelId};
pub use codec::{decode, decode_message, encode, encode_message, from_value, to_value};
pub use codecs::{codec_name, CodecId};
pub use error::{ProtoError, Result};
pub use message::WireMessage;
pub use packet::{DataPacket, StreamPacket, FRAME_ALL};
pub use rmpv::Value;
