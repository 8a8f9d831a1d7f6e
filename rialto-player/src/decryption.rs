//! External decryption-service collaborator. Key-session management and
//! the actual cipher implementation live outside this crate; this trait
//! is the narrow call interface the protection-metadata adapter and
//! sample ingest path need.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKeyErrorStatus {
    Ok,
    Fail,
    KeyNotFound,
    NeedsMoreData,
    InvalidState,
}

pub trait DecryptionService: Send + Sync {
    fn decrypt(
        &self,
        key_session_id: i32,
        buffer: &mut gstreamer::Buffer,
        caps: &gstreamer::Caps,
    ) -> MediaKeyErrorStatus;

    #[allow(clippy::too_many_arguments)]
    fn decrypt_with_subsamples(
        &self,
        key_session_id: i32,
        buffer: &mut gstreamer::Buffer,
        subsamples: &[u8],
        subsample_count: u32,
        iv: &[u8],
        key_id: &[u8],
        init_with_last15: bool,
        caps: &gstreamer::Caps,
    ) -> MediaKeyErrorStatus;

    fn is_playready_key_system(&self, key_session_id: i32) -> bool;
    fn select_key_id(&self, key_session_id: i32, key_id: &[u8]) -> MediaKeyErrorStatus;
    fn increment_session_id_usage_counter(&self, key_session_id: i32);
    fn decrement_session_id_usage_counter(&self, key_session_id: i32);
}

/// Reads segments out of a shared-memory partition. The partition's
/// byte layout is an external collaborator concern; this trait is the
/// seam the ingest path calls through once it has located the
/// partition.
pub trait DataReader: Send {
    fn read(&mut self, index: usize) -> Option<rialto_common::MediaSegment>;
}

/// Delegates the in-place audio codec-channel switch and audio-gap
/// handling to a platform-specific helper. No behavior is asserted here
/// beyond forwarding the call's parameters.
pub trait PlatformAudioHelper: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn perform_audio_track_codec_channel_switch(
        &self,
        playback_group: &crate::context::PlaybackGroup,
        audio_attributes: &crate::caps::AudioAttributes,
        audio_aac: bool,
        svp_enabled: bool,
        app_src: &gstreamer::Element,
        caps: &mut gstreamer::Caps,
    ) -> Result<(), crate::error::PlayerError>;

    fn process_audio_gap(
        &self,
        pipeline: &gstreamer::Element,
        position_ns: i64,
        duration_ns: i64,
        discontinuity: bool,
        is_audio_aac: bool,
    ) -> Result<(), crate::error::PlayerError>;
}

/// Logs and reports success; used where no real platform integration is
/// wired up (the helper's internals are out of scope and unspecified).
pub struct NullPlatformAudioHelper;

impl PlatformAudioHelper for NullPlatformAudioHelper {
    fn perform_audio_track_codec_channel_switch(
        &self,
        _playback_group: &crate::context::PlaybackGroup,
        audio_attributes: &crate::caps::AudioAttributes,
        audio_aac: bool,
        svp_enabled: bool,
        _app_src: &gstreamer::Element,
        _caps: &mut gstreamer::Caps,
    ) -> Result<(), crate::error::PlayerError> {
        tracing::info!(
            codec_param = %audio_attributes.codec_param,
            audio_aac,
            svp_enabled,
            "audio codec-channel switch requested (no platform helper wired up)"
        );
        Ok(())
    }

    fn process_audio_gap(
        &self,
        _pipeline: &gstreamer::Element,
        position_ns: i64,
        duration_ns: i64,
        discontinuity: bool,
        is_audio_aac: bool,
    ) -> Result<(), crate::error::PlayerError> {
        tracing::info!(
            position_ns,
            duration_ns,
            discontinuity,
            is_audio_aac,
            "audio gap processed (no platform helper wired up)"
        );
        Ok(())
    }
}
