use bytes::Bytes;
use ftlnet_proto::{ChannelId, CodecId, DataPacket, StreamPacket, Value};

/// Something observed or decided by a stream multiplexer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Every accepted packet, before any filtering.
    Raw {
        packet: StreamPacket,
        data: DataPacket,
    },
    /// The remote asked for a frameset/frame/channel.
    Request { packet: StreamPacket },
    /// Frameset-level metadata was decoded and cached.
    FramesetData { channel: ChannelId, value: Value },
    /// The active frame's timestamp moved on; carries the previous one.
    FrameEnd { timestamp: i64 },
    /// First packet of a new timestamp on the active frame.
    FrameStart { timestamp: i64 },
    /// A data channel packet, or a video packet on an enabled channel.
    Packet {
        packet: StreamPacket,
        data: DataPacket,
    },
    /// Metadata on the active frame was decoded and cached.
    Data { channel: ChannelId, value: Value },
    /// Video payload on an enabled channel.
    Video {
        channel: ChannelId,
        timestamp: i64,
        codec: CodecId,
        frame_count: u32,
        payload: Bytes,
    },
    /// First element of a decoded control-channel value.
    Control { command: Value },
    /// The remote accepted the stream.
    Ready,
    /// The multiplexer stopped.
    Stop,
}

impl StreamEvent {
    /// Short label used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Raw { .. } => "raw",
            Self::Request { .. } => "request",
            Self::FramesetData { .. } => "fsdata",
            Self::FrameEnd { .. } => "frame_end",
            Self::FrameStart { .. } => "frame_start",
            Self::Packet { .. } => "packet",
            Self::Data { .. } => "data",
            Self::Video { .. } => "video",
            Self::Control { .. } => "control",
            Self::Ready => "ready",
            Self::Stop => "stop",
        }
    }
}
