//! Channel identifier table.
//!
//! Routing only looks at numeric ranges:
//! - `0..32` video channels, delivered only when enabled
//! - `32..64` generic data channels (audio etc.)
//! - `64..` metadata channels whose payloads are decoded and cached

/// Numeric channel identifier.
pub type ChannelId = u16;

/// First non-video channel.
pub const DATA_CHANNEL_START: ChannelId = 32;

/// First channel whose payload is a decodable value.
pub const METADATA_CHANNEL_START: ChannelId = 64;

// Video
pub const COLOUR: ChannelId = 0;
pub const DEPTH: ChannelId = 1;
pub const RIGHT: ChannelId = 2;
pub const RIGHT_DEPTH: ChannelId = 3;
pub const SCREEN: ChannelId = 4;
pub const NORMALS: ChannelId = 5;
pub const WEIGHTS: ChannelId = 6;
pub const CONFIDENCE: ChannelId = 7;
pub const ENERGY_VECTOR: ChannelId = 8;
pub const FLOW: ChannelId = 9;
pub const ENERGY: ChannelId = 10;
pub const MASK: ChannelId = 11;
pub const DENSITY: ChannelId = 12;
pub const SUPPORT1: ChannelId = 13;
pub const SUPPORT2: ChannelId = 14;
pub const SEGMENTATION: ChannelId = 15;
pub const NORMALS2: ChannelId = 16;
pub const DISPARITY: ChannelId = 18;
pub const SMOOTHING: ChannelId = 19;
pub const OVERLAY: ChannelId = 21;
pub const GROUND_TRUTH: ChannelId = 22;

// Audio
pub const AUDIO_MONO: ChannelId = 32;
pub const AUDIO_STEREO: ChannelId = 33;

// Frame metadata
pub const CONFIGURATION: ChannelId = 64;
pub const CALIBRATION: ChannelId = 65;
pub const POSE: ChannelId = 66;
pub const CALIBRATION2: ChannelId = 67;
pub const INDEX: ChannelId = 68;
pub const CONTROL: ChannelId = 69;
pub const SETTINGS3: ChannelId = 70;
pub const META_DATA: ChannelId = 71;
pub const CAPABILITIES: ChannelId = 72;
pub const CALIBRATION_DATA: ChannelId = 73;
pub const THUMBNAIL: ChannelId = 74;
pub const OVERLAY_SELECT: ChannelId = 75;
pub const START_TIME: ChannelId = 76;
pub const USER: ChannelId = 77;

// Sensors
pub const ACCELEROMETER: ChannelId = 90;
pub const GYROSCOPE: ChannelId = 91;

// Camera settings
pub const BRIGHTNESS: ChannelId = 100;
pub const CONTRAST: ChannelId = 101;
pub const EXPOSURE: ChannelId = 102;
pub const GAIN: ChannelId = 103;
pub const WHITE_BALANCE: ChannelId = 104;
pub const AUTO_EXPOSURE: ChannelId = 105;
pub const AUTO_WHITE_BALANCE: ChannelId = 106;
pub const CAMERA_TEMPERATURE: ChannelId = 107;

// Depth sensor settings
pub const RS2_LASER_POWER: ChannelId = 150;
pub const RS2_MIN_DISTANCE: ChannelId = 151;
pub const RS2_MAX_DISTANCE: ChannelId = 152;
pub const RS2_INTER_CAM_SYNC: ChannelId = 153;
pub const RS2_POST_SHARPENING: ChannelId = 154;

// Renderer settings
pub const RENDERER_CAMERA_TYPE: ChannelId = 400;
pub const RENDERER_VISUALISATION: ChannelId = 401;
pub const RENDERER_ENGINE: ChannelId = 402;
pub const RENDERER_FPS: ChannelId = 403;
pub const RENDERER_VIEW: ChannelId = 404;
pub const RENDERER_CHANNEL: ChannelId = 405;
pub const RENDERER_OPACITY: ChannelId = 406;
pub const RENDERER_SOURCES: ChannelId = 407;
pub const RENDERER_PROJECTION: ChannelId = 408;
pub const RENDERER_BACKGROUND: ChannelId = 409;
pub const RENDERER_SHOW_BAD_COLOUR: ChannelId = 420;
pub const RENDERER_COOL_EFFECT: ChannelId = 421;
pub const RENDERER_EFFECT_COLOUR: ChannelId = 422;
pub const RENDERER_SHOW_COLOUR_WEIGHTS: ChannelId = 423;
pub const RENDERER_TRIANGLE_LIMIT: ChannelId = 424;
pub const RENDERER_DISCON_DISPARITIES: ChannelId = 425;
pub const RENDERER_NORMAL_WEIGHT_COLOUR: ChannelId = 426;
pub const RENDERER_CHANNEL_WEIGHTS: ChannelId = 427;
pub const RENDERER_ACCUM_FUNC: ChannelId = 428;

// Frameset-level data
 /// Marks the last packet of a frameset.
pub const END_FRAME: ChannelId = 2048;
pub const FACES: ChannelId = 2049;
pub const TRANSFORMS: ChannelId = 2050;
pub const SHAPES_3D: ChannelId = 2051;
pub const MESSAGES: ChannelId = 2052;
pub const TOUCH: ChannelId = 2053;

const CHANNELS: &[(ChannelId, &str)] = &[
    (COLOUR, "Colour"),
    (DEPTH, "Depth"),
    (RIGHT, "Right"),
    (RIGHT_DEPTH, "RightDepth"),
    (SCREEN, "Screen"),
    (NORMALS, "Normals"),
    (WEIGHTS, "Weights"),
    (CONFIDENCE, "Confidence"),
    (ENERGY_VECTOR, "EnergyVector"),
    (FLOW, "Flow"),
    (ENERGY, "Energy"),
    (MASK, "Mask"),
    (DENSITY, "Density"),
    (SUPPORT1, "Support1"),
    (SUPPORT2, "Support2"),
    (SEGMENTATION, "Segmentation"),
    (NORMALS2, "Normals2"),
    (DISPARITY, "Disparity"),
    (SMOOTHING, "Smoothing"),
    (OVERLAY, "Overlay"),
    (GROUND_TRUTH, "GroundTruth"),
    (AUDIO_MONO, "AudioMono"),
    (AUDIO_STEREO, "AudioStereo"),
    (CONFIGURATION, "Configuration"),
    (CALIBRATION, "Calibration"),
    (POSE, "Pose"),
    (CALIBRATION2, "Calibration2"),
    (INDEX, "Index"),
    (CONTROL, "Control"),
    (SETTINGS3, "Settings3"),
    (META_DATA, "MetaData"),
    (CAPABILITIES, "Capabilities"),
    (CALIBRATION_DATA, "CalibrationData"),
    (THUMBNAIL, "Thumbnail"),
    (OVERLAY_SELECT, "OverlaySelect"),
    (START_TIME, "StartTime"),
    (USER, "User"),
    (ACCELEROMETER, "Accelerometer"),
    (GYROSCOPE, "Gyroscope"),
    (BRIGHTNESS, "Brightness"),
    (CONTRAST, "Contrast"),
    (EXPOSURE, "Exposure"),
    (GAIN, "Gain"),
    (WHITE_BALANCE, "WhiteBalance"),
    (AUTO_EXPOSURE, "AutoExposure"),
    (AUTO_WHITE_BALANCE, "AutoWhiteBalance"),
    (CAMERA_TEMPERATURE, "CameraTemperature"),
    (RS2_LASER_POWER, "RS2_LaserPower"),
    (RS2_MIN_DISTANCE, "RS2_MinDistance"),
    (RS2_MAX_DISTANCE, "RS2_MaxDistance"),
    (RS2_INTER_CAM_SYNC, "RS2_InterCamSync"),
    (RS2_POST_SHARPENING, "RS2_PostSharpening"),
    (RENDERER_CAMERA_TYPE, "Renderer_CameraType"),
    (RENDERER_VISUALISATION, "Renderer_Visualisation"),
    (RENDERER_ENGINE, "Renderer_Engine"),
    (RENDERER_FPS, "Renderer_FPS"),
    (RENDERER_VIEW, "Renderer_View"),
    (RENDERER_CHANNEL, "Renderer_Channel"),
    (RENDERER_OPACITY, "Renderer_Opacity"),
    (RENDERER_SOURCES, "Renderer_Sources"),
    (RENDERER_PROJECTION, "Renderer_Projection"),
    (RENDERER_BACKGROUND, "Renderer_Background"),
    (RENDERER_SHOW_BAD_COLOUR, "Renderer_ShowBadColour"),
    (RENDERER_COOL_EFFECT, "Renderer_CoolEffect"),
    (RENDERER_EFFECT_COLOUR, "Renderer_EffectColour"),
    (RENDERER_SHOW_COLOUR_WEIGHTS, "Renderer_ShowColourWeights"),
    (RENDERER_TRIANGLE_LIMIT, "Renderer_TriangleLimit"),
    (RENDERER_DISCON_DISPARITIES, "Renderer_DisconDisparities"),
    (RENDERER_NORMAL_WEIGHT_COLOUR, "Renderer_NormalWeightColour"),
    (RENDERER_CHANNEL_WEIGHTS, "Renderer_ChannelWeights"),
    (RENDERER_ACCUM_FUNC, "Renderer_AccumFunc"),
    (END_FRAME, "EndFrame"),
    (FACES, "Faces"),
    (TRANSFORMS, "Transforms"),
    (SHAPES_3D, "Shapes3D"),
    (MESSAGES, "Messages"),
    (TOUCH, "Touch"),
];

/// Human-readable name for a known channel.
pub fn channel_name(id: ChannelId) -> Option<&'static str> {
    CHANNELS
        .iter()
        .find(|(channel, _)| *channel == id)
        .map(|(_, name)| *name)
}

/// Channel id for a known name.
pub fn channel_from_name(name: &str) -> Option<ChannelId> {
    CHANNELS
        .iter()
        .find(|(_, channel_name)| *channel_name == name)
        .map(|(channel, _)| *channel)
}

/// Video channels are only delivered when explicitly enabled.
pub fn is_video(id: ChannelId) -> bool {
    id < DATA_CHANNEL_START
}

/// Data and metadata channels are always delivered.
pub fn is_data(id: ChannelId) -> bool {
    id >= DATA_CHANNEL_START
}

/// Metadata channel payloads are MessagePack values worth decoding.
pub fn is_metadata(id: ChannelId) -> bool {
    id >= METADATA_CHANNEL_START
}
