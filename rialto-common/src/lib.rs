//! Wire-adjacent types shared between the player core and the session
//! server: media source descriptors, encryption descriptors, and the
//! client-facing command/event surface.
//!
//! The actual IPC framing that would carry these across a socket is out
//! of scope for this crate; these types are the seam a transport layer
//! would serialize.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type SessionId = u32;

/// Identifies one of a session's attached sources. Negative/sentinel
/// values from the original C++ are replaced by `Option<SourceId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub i32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monotonically increasing identifier minted for each NeedMediaData
/// request.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaSourceType {
    Audio,
    Video,
    Subtitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SegmentAlignment {
    #[default]
    None,
    Nal,
    Au,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CipherMode {
    #[default]
    Unknown,
    Cenc,
    Cbc1,
    Cens,
    Cbcs,
}

/// `decryptionServiceRef` is modelled as an opaque handle identifying
/// which `DecryptionService` instance owns the key session, since the
/// service itself lives outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionDescriptor {
    pub key_session_id: i32,
    pub subsample_count: u32,
    pub subsamples: Vec<u8>,
    pub iv: Vec<u8>,
    pub key_id: Vec<u8>,
    pub init_with_last15: bool,
    pub cipher_mode: CipherMode,
    pub crypt: u32,
    pub skip: u32,
    /// Only meaningful (and only ever set) for `Cens`/`Cbcs`.
    pub encryption_pattern_set: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSegmentCommon {
    pub pts: i64,
    pub dts: i64,
    pub data: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub codec_data: Option<Vec<u8>>,
    pub segment_alignment: SegmentAlignment,
    pub encryption: Option<EncryptionDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSegment {
    pub common: MediaSegmentCommon,
    pub sample_rate: u32,
    pub channels: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSegment {
    pub common: MediaSegmentCommon,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<FrameRate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDolbyVisionSegment {
    pub video: VideoSegment,
    pub dolby_vision_profile: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MediaSegment {
    Audio(AudioSegment),
    Video(VideoSegment),
    VideoDolbyVision(VideoDolbyVisionSegment),
    Subtitle(MediaSegmentCommon),
}

impl MediaSegment {
    pub fn source_type(&self) -> MediaSourceType {
        match self {
            MediaSegment::Audio(_) => MediaSourceType::Audio,
            MediaSegment::Video(_) | MediaSegment::VideoDolbyVision(_) => MediaSourceType::Video,
            MediaSegment::Subtitle(_) => MediaSourceType::Subtitle,
        }
    }

    pub fn common(&self) -> &MediaSegmentCommon {
        match self {
            MediaSegment::Audio(s) => &s.common,
            MediaSegment::Video(s) => &s.common,
            MediaSegment::VideoDolbyVision(s) => &s.video.common,
            MediaSegment::Subtitle(s) => s,
        }
    }
}

/// The attach-time media source descriptor, as distinct from the
/// per-sample `MediaSegment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSourceAudio {
    pub mime_type: String,
    pub channels: u32,
    pub sample_rate: u32,
    pub codec_specific_config: Vec<u8>,
    pub segment_alignment: SegmentAlignment,
    pub stream_format: Option<String>,
    pub codec_data: Option<Vec<u8>>,
    pub has_drm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSourceVideo {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<FrameRate>,
    pub segment_alignment: SegmentAlignment,
    pub stream_format: Option<String>,
    pub codec_data: Option<Vec<u8>>,
    pub has_drm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSourceVideoDolbyVision {
    pub video: MediaSourceVideo,
    pub dolby_vision_profile: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MediaSource {
    Audio(MediaSourceAudio),
    Video(MediaSourceVideo),
    VideoDolbyVision(MediaSourceVideoDolbyVision),
}

impl MediaSource {
    pub fn source_type(&self) -> MediaSourceType {
        match self {
            MediaSource::Audio(_) => MediaSourceType::Audio,
            MediaSource::Video(_) | MediaSource::VideoDolbyVision(_) => MediaSourceType::Video,
        }
    }

    pub fn has_drm(&self) -> bool {
        match self {
            MediaSource::Audio(a) => a.has_drm,
            MediaSource::Video(v) => v.has_drm,
            MediaSource::VideoDolbyVision(v) => v.video.has_drm,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            MediaSource::Audio(a) => &a.mime_type,
            MediaSource::Video(v) => &v.mime_type,
            MediaSource::VideoDolbyVision(v) => &v.video.mime_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequirements {
    pub max_width: u32,
    pub max_height: u32,
}

impl VideoRequirements {
    /// Secondary if both dims are below 1920x1080.
    pub fn is_secondary_video(&self) -> bool {
        self.max_width < 1920 && self.max_height < 1080
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaveDataStatus {
    Ok,
    Eos,
    Error,
    NoAvailableSamples,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShmPartitionInfo {
    pub max_metadata_bytes: u32,
    pub metadata_offset: u32,
    pub media_data_offset: u32,
    pub max_media_bytes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Paused,
    Playing,
    Stopped,
    EndOfStream,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkState {
    Buffering,
    Buffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebAudioPlayerState {
    Idle,
    Paused,
    Playing,
    EndOfStream,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosInfo {
    pub processed: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStats {
    pub rendered: u64,
    pub dropped: u64,
}

/// Event surface emitted from the player to its client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "params")]
pub enum ClientEvent {
    NetworkStateChange {
        session_id: SessionId,
        state: NetworkState,
    },
    PlaybackStateChange {
        session_id: SessionId,
        state: PlaybackState,
    },
    PositionChange {
        session_id: SessionId,
        position_ns: i64,
    },
    NeedMediaData {
        session_id: SessionId,
        source_id: SourceId,
        frame_count: u32,
        request_id: RequestId,
        shm: ShmPartitionInfo,
    },
    Qos {
        session_id: SessionId,
        source_id: SourceId,
        info: QosInfo,
    },
    BufferUnderflow {
        session_id: SessionId,
        source_id: SourceId,
    },
    SourceFlushed {
        session_id: SessionId,
        source_id: SourceId,
    },
    PlaybackError {
        session_id: SessionId,
        message: String,
    },
    WebAudioPlayerStateEvent {
        session_id: SessionId,
        state: WebAudioPlayerState,
    },
}

/// Command surface. Per-session dispatch lives in
/// `rialto-server`'s `SessionManager`; this enum exists so a future
/// transport layer has a single concrete type to (de)serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    CreateSession {
        max_width: u32,
        max_height: u32,
    },
    Load {
        session_id: SessionId,
    },
    AttachSource {
        session_id: SessionId,
        source: MediaSource,
        switch_source: bool,
    },
    RemoveSource {
        session_id: SessionId,
        source_id: SourceId,
    },
    AllSourcesAttached {
        session_id: SessionId,
    },
    Play {
        session_id: SessionId,
    },
    Pause {
        session_id: SessionId,
    },
    Stop {
        session_id: SessionId,
    },
    SetPosition {
        session_id: SessionId,
        position_ns: i64,
    },
    GetPosition {
        session_id: SessionId,
    },
    SetPlaybackRate {
        session_id: SessionId,
        rate: f64,
    },
    SetVideoWindow {
        session_id: SessionId,
        geometry: VideoGeometry,
    },
    SetVolume {
        session_id: SessionId,
        volume: f64,
    },
    GetVolume {
        session_id: SessionId,
    },
    SetMute {
        session_id: SessionId,
        muted: bool,
    },
    GetMute {
        session_id: SessionId,
    },
    Flush {
        session_id: SessionId,
        source_id: SourceId,
        reset_time: bool,
    },
    SetSourcePosition {
        session_id: SessionId,
        source_id: SourceId,
        position_ns: i64,
        reset_time: bool,
        applied_rate: f64,
        stop_position_ns: Option<i64>,
    },
    ProcessAudioGap {
        session_id: SessionId,
        position_ns: i64,
        duration_ns: i64,
        discontinuity: bool,
        is_audio_aac: bool,
    },
    SetImmediateOutput {
        session_id: SessionId,
        source_id: SourceId,
        enabled: bool,
    },
    GetImmediateOutput {
        session_id: SessionId,
        source_id: SourceId,
    },
    GetStats {
        session_id: SessionId,
        source_id: SourceId,
    },
    HaveData {
        session_id: SessionId,
        status: HaveDataStatus,
        num_frames: u32,
        request_id: RequestId,
    },
    DestroySession {
        session_id: SessionId,
    },
    CreateWebAudioPlayer {
        pcm: WebAudioPcmConfig,
        mime: String,
        priority: u32,
    },
    DestroyWebAudioPlayer {
        session_id: SessionId,
    },
    WebAudioPlay {
        session_id: SessionId,
    },
    WebAudioPause {
        session_id: SessionId,
    },
    WebAudioSetEos {
        session_id: SessionId,
    },
    WebAudioGetBufferAvailable {
        session_id: SessionId,
    },
    WebAudioGetBufferDelay {
        session_id: SessionId,
    },
    WebAudioWriteBuffer {
        session_id: SessionId,
        num_frames: u32,
        main: Vec<u8>,
        wrap: Vec<u8>,
    },
    WebAudioGetDeviceInfo {
        session_id: SessionId,
    },
    WebAudioSetVolume {
        session_id: SessionId,
        volume: f64,
    },
    WebAudioGetVolume {
        session_id: SessionId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebAudioPcmConfig {
    pub rate: u32,
    pub channels: u32,
    pub sample_size: u32,
    pub is_big_endian: bool,
    pub is_signed: bool,
    pub is_float: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WebAudioBufferAvailable {
    pub offset_main: u64,
    pub length_main: u32,
    pub offset_wrap: u64,
    pub length_wrap: u32,
    pub available_frames: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WebAudioDeviceInfo {
    pub maximum_frames: u32,
    pub preferred_frames: u32,
    pub support_deferred_play: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_video_requires_both_dims_below_threshold() {
        assert!(VideoRequirements { max_width: 1280, max_height: 720 }.is_secondary_video());
        assert!(!VideoRequirements { max_width: 1920, max_height: 720 }.is_secondary_video());
        assert!(!VideoRequirements { max_width: 1280, max_height: 1080 }.is_secondary_video());
    }

    #[test]
    fn command_round_trips_through_json() {
        let cmd = Command::SetPlaybackRate { session_id: 1, rate: 1.5 };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        matches!(back, Command::SetPlaybackRate { session_id: 1, rate } if rate == 1.5);
    }
}
