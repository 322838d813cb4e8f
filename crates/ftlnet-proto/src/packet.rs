//! Stream-position and payload packets carried by stream traffic.

use bytes::Bytes;
use rmpv::Value;

use crate::channel::ChannelId;
use crate::codecs::{self, CodecId};
use crate::error::{ProtoError, Result};

/// Frame id meaning "the whole frameset" rather than one frame.
pub const FRAME_ALL: u8 = 255;

/// Stream flag: the packet is a request from the peer, not data.
pub const FLAG_REQUEST: u8 = 0x01;
/// Stream flag: request a fresh keyframe.
pub const FLAG_KEYFRAME: u8 = 0x04;

// Fixed header values the capture nodes expect on zero-payload requests.
const REQUEST_RESERVED: u32 = 7;
const REQUEST_FRAME_COUNT: u32 = 35;
const REQUEST_BITRATE: u32 = 255;
const VALUE_RESERVED: u32 = 7;

/// Where a packet sits in the stream: `[timestamp, frameset, frame, channel, flags]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamPacket {
    pub timestamp: i64,
    pub frameset: u32,
    pub frame: u8,
    pub channel: ChannelId,
    pub flags: u8,
}

impl StreamPacket {
    pub fn new(timestamp: i64, frameset: u32, frame: u8, channel: ChannelId, flags: u8) -> Self {
        Self {
            timestamp,
            frameset,
            frame,
            channel,
            flags,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn frameset(&self) -> u32 {
        self.frameset
    }

    pub fn frame(&self) -> u8 {
        self.frame
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Flag bit 0: this packet asks for data instead of carrying it.
    pub fn is_request(&self) -> bool {
        self.flags & FLAG_REQUEST != 0
    }

    /// Addresses the whole frameset rather than one frame.
    pub fn is_frameset_level(&self) -> bool {
        self.frame == FRAME_ALL
    }

    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::from(self.timestamp),
            Value::from(self.frameset),
            Value::from(self.frame),
            Value::from(self.channel),
            Value::from(self.flags),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = packet_fields(value, 5, "stream packet")?;
        Ok(Self {
            timestamp: integer(&fields[0], "timestamp")?,
            frameset: integer(&fields[1], "frameset")?,
            frame: integer(&fields[2], "frame")?,
            channel: integer(&fields[3], "channel")?,
            flags: integer(&fields[4], "flags")?,
        })
    }
}

/// Payload packet: `[codec, reserved, frame_count, bitrate, flags, payload]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub codec: CodecId,
    pub reserved: u32,
    pub frame_count: u32,
    pub bitrate: u32,
    pub flags: u32,
    pub payload: Bytes,
}

impl DataPacket {
    /// Zero-payload packet sent alongside request/keyframe stream packets.
    pub fn request() -> Self {
        Self {
            codec: codecs::ANY,
            reserved: REQUEST_RESERVED,
            frame_count: REQUEST_FRAME_COUNT,
            bitrate: REQUEST_BITRATE,
            flags: 0,
            payload: Bytes::new(),
        }
    }

    /// MessagePack-encoded value payload.
    pub fn msgpack(payload: Bytes) -> Self {
        Self {
            codec: codecs::MSGPACK,
            reserved: VALUE_RESERVED,
            frame_count: 1,
            bitrate: 0,
            flags: 0,
            payload,
        }
    }

    pub fn codec(&self) -> CodecId {
        self.codec
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn data(&self) -> &Bytes {
        &self.payload
    }

    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::from(self.codec),
            Value::from(self.reserved),
            Value::from(self.frame_count),
            Value::from(self.bitrate),
            Value::from(self.flags),
            Value::Binary(self.payload.to_vec()),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = packet_fields(value, 6, "data packet")?;
        let payload = match &fields[5] {
            Value::Binary(bytes) => Bytes::copy_from_slice(bytes),
            Value::Nil => Bytes::new(),
            other => {
                return Err(ProtoError::InvalidPacket(format!(
                    "data packet payload must be binary, got {other}"
                )))
            }
        };
        Ok(Self {
            codec: integer(&fields[0], "codec")?,
            reserved: integer(&fields[1], "reserved")?,
            frame_count: integer(&fields[2], "frame_count")?,
            bitrate: integer(&fields[3], "bitrate")?,
            flags: integer(&fields[4], "flags")?,
            payload,
        })
    }
}

fn packet_fields<'a>(value: &'a Value, len: usize, what: &str) -> Result<&'a [Value]> {
    match value.as_array() {
        Some(fields) if fields.len() == len => Ok(fields),
        Some(fields) => Err(ProtoError::InvalidPacket(format!(
            "{what} must have {len} fields, got {}",
            fields.len()
        ))),
        None => Err(ProtoError::InvalidPacket(format!(
            "{what} must be an array, got {value}"
        ))),
    }
}

fn integer<T: TryFrom<i64>>(value: &Value, field: &str) -> Result<T> {
    let raw = match value {
        Value::Integer(n) => n.as_i64(),
        // Some encoders emit whole-number timestamps as doubles.
        Value::F64(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    };
    raw.and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| ProtoError::InvalidPacket(format!("{field} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_packet_positional_layout() {
        let packet = StreamPacket::new(100, 0, 1, 64, 0);
        let value = packet.to_value();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::from(100),
                Value::from(0),
                Value::from(1),
                Value::from(64),
                Value::from(0),
            ])
        );
        assert_eq!(StreamPacket::from_value(&value).unwrap(), packet);
    }

    #[test]
    fn request_flag_is_bit_zero() {
        assert!(StreamPacket::new(1, 0, 0, 0, 1).is_request());
        assert!(StreamPacket::new(1, 0, 0, 0, FLAG_REQUEST | FLAG_KEYFRAME).is_request());
        assert!(!StreamPacket::new(1, 0, 0, 0, 0).is_request());
        assert!(!StreamPacket::new(1, 0, 0, 0, FLAG_KEYFRAME).is_request());
    }

    #[test]
    fn out_of_range_frame_is_rejected() {
        let value = Value::Array(vec![
            Value::from(1),
            Value::from(0),
            Value::from(300),
            Value::from(0),
            Value::from(0),
        ]);
        assert!(matches!(
            StreamPacket::from_value(&value),
            Err(ProtoError::InvalidPacket(_))
        ));
    }

    #[test]
    fn float_timestamp_is_accepted() {
        let value = Value::Array(vec![
            Value::F64(1_700_000_000_000.0),
            Value::from(2),
            Value::from(255),
            Value::from(2048),
            Value::from(0),
        ]);
        let packet = StreamPacket::from_value(&value).unwrap();
        assert_eq!(packet.timestamp, 1_700_000_000_000);
        assert!(packet.is_frameset_level());
    }

    #[test]
    fn data_packet_payload_forms() {
        let request = DataPacket::request();
        assert!(request.payload.is_empty());
        assert_eq!(DataPacket::from_value(&request.to_value()).unwrap(), request);

        let nil_payload = Value::Array(vec![
            Value::from(0),
            Value::from(0),
            Value::from(1),
            Value::from(255),
            Value::from(0),
            Value::Nil,
        ]);
        assert!(DataPacket::from_value(&nil_payload).unwrap().payload.is_empty());

        let wrong_arity = Value::Array(vec![Value::from(0); 5]);
        assert!(DataPacket::from_value(&wrong_arity).is_err());
    }
}
