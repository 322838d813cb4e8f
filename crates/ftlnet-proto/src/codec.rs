//! Opaque MessagePack encode/decode pair.

use bytes::Bytes;
use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtoError, Result};
use crate::message::WireMessage;

/// Encode a dynamic value to MessagePack bytes.
pub fn encode(value: &Value) -> Result<Bytes> {
    let mut buf = Vec::with_capacity(64);
    rmpv::encode::write_value(&mut buf, value).map_err(|err| ProtoError::Encode(err.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode exactly one MessagePack value.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let mut rest = bytes;
    let value =
        rmpv::decode::read_value(&mut rest).map_err(|err| ProtoError::Decode(err.to_string()))?;
    if !rest.is_empty() {
        return Err(ProtoError::TrailingBytes(rest.len()));
    }
    Ok(value)
}

/// Encode a wire message for transmission.
pub fn encode_message(message: &WireMessage) -> Result<Bytes> {
    encode(&message.to_value())
}

/// Decode a received socket payload into a wire message.
pub fn decode_message(bytes: &[u8]) -> Result<WireMessage> {
    WireMessage::from_value(decode(bytes)?)
}

/// Convert any serializable value into a dynamic value.
pub fn to_value<T: Serialize>(value: T) -> Result<Value> {
    Ok(rmpv::ext::to_value(value)?)
}

/// Convert a dynamic value into a typed one.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(rmpv::ext::from_value(value)?)
}

/// Serialize a typed value straight to MessagePack bytes.
pub fn encode_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    rmp_serde::to_vec(value)
        .map(Bytes::from)
        .map_err(|err| ProtoError::Encode(err.to_string()))
}

/// Deserialize MessagePack bytes straight into a typed value.
pub fn decode_deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|err| ProtoError::Decode(err.to_string()))
}
