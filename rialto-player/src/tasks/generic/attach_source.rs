//! AttachSource. Builds caps, creates an appsrc per type, and stores it
//! in `streamInfo`. When an audio entry already exists with unequal
//! caps, delegates to the shared switch-source control flow; if
//! re-attaching after a Remove with unequal remembered caps, triggers
//! the same "legacy switch" path.

use super::switch_source;
use crate::context::{GenericPlayerContext, StreamInfo};
use crate::decryption::PlatformAudioHelper;
use crate::error::PlayerError;
use crate::source::RialtoSource;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;
use rialto_common::{MediaSource, MediaSourceType, SourceId};
use std::sync::Arc;

pub struct AttachSource {
    pub source_id: SourceId,
    pub source: MediaSource,
    pub switch_source: bool,
    pub platform_helper: Arc<dyn PlatformAudioHelper>,
}

impl PlayerTask for AttachSource {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let source_type = self.source.source_type();
        let has_drm = self.source.has_drm();
        let new_caps = crate::caps::build_caps(&self.source);

        if source_type == MediaSourceType::Audio {
            if let Some(existing) = ctx.stream_info.get(&source_type) {
                let caps_differ = existing.attached_caps.as_ref() != Some(&new_caps);
                if self.switch_source && caps_differ {
                    if let MediaSource::Audio(audio) = &self.source {
                        let app_src = existing.app_src.clone();
                        let resolved =
                            switch_source::perform_switch(ctx, audio, &app_src, self.platform_helper.as_ref())?;
                        if let Some(info) = ctx.stream_info.get_mut(&source_type) {
                            info.attached_caps = Some(resolved);
                        }
                        return Ok(());
                    }
                }
                // Caps updated in place, no helper invocation needed.
                if caps_differ {
                    if let Some(info) = ctx.stream_info.get_mut(&source_type) {
                        info.attached_caps = Some(new_caps);
                    }
                }
                return Ok(());
            }

            // Reattach after RemoveSource(audio).
            if let Some(removed_caps) = ctx.removed_audio_caps.take() {
                if removed_caps != new_caps {
                    if let MediaSource::Audio(audio) = &self.source {
                        let rialto_source = RialtoSource::new();
                        let app_src = rialto_source.build_app_src(source_type, &new_caps);
                        let resolved = switch_source::perform_switch(
                            ctx,
                            audio,
                            &app_src,
                            self.platform_helper.as_ref(),
                        )?;
                        ctx.stream_info.insert(
                            source_type,
                            StreamInfo {
                                source_id: self.source_id,
                                app_src,
                                has_drm,
                                attached_caps: Some(resolved),
                                low_latency: false,
                            },
                        );
                        return Ok(());
                    }
                }
                // Equal caps: no graph surgery, just recreate the
                // appsrc plainly.
            }
        }

        if ctx.stream_info.contains_key(&source_type) {
            return Err(PlayerError::Misuse(format!(
                "source type {source_type:?} already attached"
            )));
        }

        let rialto_source = RialtoSource::new();
        let app_src = rialto_source.build_app_src(source_type, &new_caps);
        link_fresh_source(ctx, source_type, &app_src)?;
        ctx.stream_info.insert(
            source_type,
            StreamInfo {
                source_id: self.source_id,
                app_src,
                has_drm,
                attached_caps: Some(new_caps),
                low_latency: false,
            },
        );
        Ok(())
    }
}

/// Wires a freshly built appsrc into the live pipeline via `decodebin`,
/// dynamically linking its decoded pad to a type-appropriate sink once
/// the caps are known — the generic decodebin/pad-added pattern every
/// appsrc-fed player uses. A no-op until `Load` has constructed a
/// pipeline — attaching sources before Load just populates `streamInfo`
/// for when the graph exists.
fn link_fresh_source(
    ctx: &GenericPlayerContext,
    source_type: MediaSourceType,
    app_src: &gstreamer::Element,
) -> Result<(), PlayerError> {
    let Some(pipeline) = ctx.pipeline.as_ref() else {
        return Ok(());
    };
    let bin = pipeline
        .dynamic_cast_ref::<gstreamer::Bin>()
        .ok_or_else(|| PlayerError::FrameworkFailure("pipeline is not a Bin".into()))?;

    let decodebin = gstreamer::ElementFactory::make("decodebin")
        .build()
        .map_err(|_| PlayerError::FrameworkFailure("failed to create decodebin".into()))?;
    let sink = match source_type {
        MediaSourceType::Video => gstreamer::ElementFactory::make("westerossink")
            .build()
            .or_else(|_| gstreamer::ElementFactory::make("autovideosink").build()),
        MediaSourceType::Audio => gstreamer::ElementFactory::make("autoaudiosink").build(),
        MediaSourceType::Subtitle => gstreamer::ElementFactory::make("fakesink").build(),
    }
    .map_err(|_| PlayerError::FrameworkFailure(format!("no sink factory available for {source_type:?}")))?;

    bin.add_many([app_src, &decodebin, &sink])
        .map_err(|_| PlayerError::FrameworkFailure("failed to add source chain to pipeline".into()))?;
    app_src
        .link(&decodebin)
        .map_err(|_| PlayerError::FrameworkFailure("failed to link appsrc to decodebin".into()))?;

    let sink_for_closure = sink.clone();
    decodebin.connect_pad_added(move |_decodebin, src_pad| {
        let Some(sink_pad) = sink_for_closure.static_pad("sink") else {
            return;
        };
        if sink_pad.is_linked() {
            return;
        }
        if let Err(err) = src_pad.link(&sink_pad) {
            tracing::warn!(?err, "decodebin pad-added link failed");
        }
    });

    for element in [app_src, &decodebin, &sink] {
        element
            .sync_state_with_parent()
            .map_err(|_| PlayerError::FrameworkFailure("failed to sync source chain state".into()))?;
    }

    Ok(())
}
