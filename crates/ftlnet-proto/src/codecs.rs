//! Payload codec identifiers carried in [`DataPacket`](crate::DataPacket).

/// Numeric codec identifier.
pub type CodecId = u8;

pub const JPG: CodecId = 0;
pub const PNG: CodecId = 1;
pub const H264: CodecId = 2;
pub const HEVC: CodecId = 3;
pub const H264_LOSSLESS: CodecId = 4;
pub const HEVC_LOSSLESS: CodecId = 5;

pub const WAVE: CodecId = 32;
pub const OPUS: CodecId = 33;

pub const JSON: CodecId = 100;
pub const CALIBRATION: CodecId = 101;
pub const POSE: CodecId = 102;
/// Metadata values set through a stream are always sent with this codec.
pub const MSGPACK: CodecId = 103;
pub const STRING: CodecId = 104;
pub const RAW: CodecId = 105;

pub const INVALID: CodecId = 254;
/// Wildcard used on request packets.
pub const ANY: CodecId = 255;

/// Human-readable codec name.
pub fn codec_name(codec: CodecId) -> Option<&'static str> {
    match codec {
        JPG => Some("JPG"),
        PNG => Some("PNG"),
        H264 => Some("H264"),
        HEVC => Some("HEVC"),
        H264_LOSSLESS => Some("H264Lossless"),
        HEVC_LOSSLESS => Some("HEVCLossless"),
        WAVE => Some("Wave"),
        OPUS => Some("OPUS"),
        JSON => Some("JSON"),
        CALIBRATION => Some("Calibration"),
        POSE => Some("Pose"),
        MSGPACK => Some("MsgPack"),
        STRING => Some("String"),
        RAW => Some("Raw"),
        INVALID => Some("Invalid"),
        ANY => Some("Any"),
        _ => None,
    }
}

/// Video codecs produce frames that only matter on video channels.
pub fn is_video_codec(codec: CodecId) -> bool {
    codec <= HEVC_LOSSLESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(codec_name(H264), Some("H264"));
        assert_eq!(codec_name(MSGPACK), Some("MsgPack"));
        assert_eq!(codec_name(ANY), Some("Any"));
        assert_eq!(codec_name(50), None);
    }

    #[test]
    fn video_codec_range() {
        assert!(is_video_codec(JPG));
        assert!(is_video_codec(HEVC_LOSSLESS));
        assert!(!is_video_codec(WAVE));
        assert!(!is_video_codec(MSGPACK));
    }
}
