//! In-place audio source switch. Followed near-verbatim from the
//! control flow in `SwitchSource.cpp`: build new caps, query position,
//! build `AudioAttributes`, and — only if caps actually changed —
//! invoke the platform codec-channel-switch helper.

use crate::caps::{self, AudioAttributes};
use crate::context::GenericPlayerContext;
use crate::decryption::PlatformAudioHelper;
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;
use rialto_common::MediaSourceAudio;
use std::sync::Arc;

pub struct SwitchSource {
    pub audio_source: MediaSourceAudio,
    pub platform_helper: Arc<dyn PlatformAudioHelper>,
}

/// Shared by both the `switch_source=true` in-place path and the
/// post-Remove reattach path with unequal caps: both ultimately need to
/// query position, build `AudioAttributes`, and call the helper if caps
/// differ.
pub fn perform_switch(
    ctx: &mut GenericPlayerContext,
    audio_source: &MediaSourceAudio,
    app_src: &gstreamer::Element,
    platform_helper: &dyn PlatformAudioHelper,
) -> Result<gstreamer::Caps, PlayerError> {
    let mut new_caps = caps::build_caps(&rialto_common::MediaSource::Audio(audio_source.clone()));

    let position_ns = ctx
        .pipeline
        .as_ref()
        .and_then(|p| p.query_position::<gstreamer::ClockTime>())
        .map(|t| t.nseconds() as i64)
        .unwrap_or(ctx.last_audio_sample_timestamps);

    let audio_attributes: AudioAttributes = caps::build_audio_attributes(audio_source);

    let old_caps = ctx
        .stream_info
        .get(&rialto_common::MediaSourceType::Audio)
        .and_then(|info| info.attached_caps.clone());

    let caps_changed = old_caps.as_ref() != Some(&new_caps);

    if caps_changed {
        // audioAac is true when the previously attached caps were
        // MPEG audio (covers the AAC mime family, whose caps base name
        // is "audio/mpeg").
        let audio_aac = old_caps
            .as_ref()
            .and_then(|c| c.structure(0).map(|s| s.name().starts_with("audio/mpeg")))
            .unwrap_or(false);

        platform_helper.perform_audio_track_codec_channel_switch(
            &ctx.playback_group,
            &audio_attributes,
            audio_aac,
            true, // svpEnabled is always on for this path.
            app_src,
            &mut new_caps,
        )?;
    }

    ctx.last_audio_sample_timestamps = position_ns;

    Ok(new_caps)
}

impl PlayerTask for SwitchSource {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let app_src = ctx
            .stream_info
            .get(&rialto_common::MediaSourceType::Audio)
            .map(|info| info.app_src.clone())
            .ok_or_else(|| PlayerError::Misuse("switch_source requires an existing audio entry".into()))?;

        let new_caps = perform_switch(ctx, &self.audio_source, &app_src, self.platform_helper.as_ref())?;

        if let Some(info) = ctx.stream_info.get_mut(&rialto_common::MediaSourceType::Audio) {
            info.attached_caps = Some(new_caps);
        }
        Ok(())
    }
}
