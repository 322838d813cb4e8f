use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use ftlnet_proto::Value;
use uuid::Uuid;

use crate::error::{PeerError, Result};

/// Compatibility token every peer must send.
pub const HANDSHAKE_MAGIC: u64 = 0x0009_3400_5364_0912;
/// Protocol version sent in the handshake. Transmitted, not gated.
pub const PROTOCOL_VERSION: u8 = 5;

const PEER_ID_LEN: usize = 16;

/// 128-bit peer identity exchanged during the handshake.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(Uuid);

impl PeerId {
    /// Fresh random identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identity of this process, generated once.
    pub fn local() -> Self {
        static LOCAL: OnceLock<PeerId> = OnceLock::new();
        *LOCAL.get_or_init(PeerId::random)
    }

    pub fn from_bytes(bytes: [u8; PEER_ID_LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|_| PeerError::InvalidArguments(format!(
                "peer id must be {PEER_ID_LEN} bytes, got {}",
                bytes.len()
            )))
    }

    pub fn as_bytes(&self) -> &[u8; PEER_ID_LEN] {
        self.0.as_bytes()
    }

    /// Lower-case hex form used as the registry key.
    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0.simple())
    }
}

impl FromStr for PeerId {
    type Err = PeerError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|err| PeerError::InvalidArguments(format!("invalid peer id '{s}': {err}")))
    }
}

/// Configuration for the identity exchange.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Magic constant sent and expected from the remote.
    pub magic: u64,
    /// Version sent to the remote.
    pub version: u8,
    /// Identity announced to the remote.
    pub local_id: PeerId,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            magic: HANDSHAKE_MAGIC,
            version: PROTOCOL_VERSION,
            local_id: PeerId::local(),
        }
    }
}

impl HandshakeConfig {
    pub fn with_local_id(mut self, id: PeerId) -> Self {
        self.local_id = id;
        self
    }
}

/// Arguments of a `__handshake__` message: `[magic, version, [id]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub magic: u64,
    pub version: u8,
    pub id: PeerId,
}

impl Handshake {
    /// The handshake this side announces.
    pub fn local(config: &HandshakeConfig) -> Self {
        Self {
            magic: config.magic,
            version: config.version,
            id: config.local_id,
        }
    }

    pub fn to_args(&self) -> Vec<Value> {
        vec![
            Value::from(self.magic),
            Value::from(self.version),
            Value::Array(vec![Value::Binary(self.id.as_bytes().to_vec())]),
        ]
    }

    /// Parse received arguments. Any unexpected shape fails the handshake.
    pub fn from_args(args: &[Value]) -> Result<Self> {
        let [magic, version, ids] = args else {
            return Err(PeerError::HandshakeFailed(format!(
                "expected 3 arguments, got {}",
                args.len()
            )));
        };

        let magic = magic
            .as_u64()
            .ok_or_else(|| PeerError::HandshakeFailed(format!("magic must be unsigned, got {magic}")))?;
        let version = version
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| PeerError::HandshakeFailed(format!("invalid version {version}")))?;
        let id = match ids.as_array().map(Vec::as_slice) {
            Some([Value::Binary(bytes)]) => PeerId::from_slice(bytes)
                .map_err(|err| PeerError::HandshakeFailed(err.to_string()))?,
            _ => {
                return Err(PeerError::HandshakeFailed(format!(
                    "peer id must be a one-element binary array, got {ids}"
                )))
            }
        };

        Ok(Self { magic, version, id })
    }

    /// Check the remote handshake against local expectations.
    pub fn validate(&self, config: &HandshakeConfig) -> Result<()> {
        validate_magic(self.magic, config.magic)
    }
}

fn validate_magic(received: u64, expected: u64) -> Result<()> {
    if received != expected {
        return Err(PeerError::HandshakeFailed(format!(
            "magic mismatch: got {received:#018x}, expected {expected:#018x}"
        )));
    }
    Ok(())
}
