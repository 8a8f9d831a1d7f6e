//! Playback controls that don't warrant their own file: video
//! geometry/immediate-output/low-latency, volume/mute, and the
//! audio-gap helper delegate. `GetImmediateOutput`/`GetStats`/
//! `GetVolume`/`GetPosition` are *not* here — those run on the caller's
//! thread directly against the pipeline rather than being enqueued, so
//! they live as plain methods on `crate::generic::GenericPlayer`.

use crate::context::GenericPlayerContext;
use crate::decryption::PlatformAudioHelper;
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;
use rialto_common::SourceId;
use std::sync::Arc;

/// Finds the current video sink element, if the pipeline has reached a
/// point where one exists. Geometry and immediate-output both apply
/// against the video sink's properties.
fn video_sink(pipeline: &gstreamer::Element) -> Option<gstreamer::Element> {
    let bin = pipeline.dynamic_cast_ref::<gstreamer::Bin>()?;
    bin.iterate_recurse()
        .into_iter()
        .find(|el| el.name().to_lowercase().contains("westeros"))
}

fn audio_sink(pipeline: &gstreamer::Element) -> Option<gstreamer::Element> {
    pipeline.property::<Option<gstreamer::Element>>("audio-sink")
}

pub struct SetImmediateOutput {
    pub source_id: SourceId,
    pub enabled: bool,
}

impl PlayerTask for SetImmediateOutput {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let pipeline = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("pipeline not yet constructed".into()))?;
        let Some(sink) = video_sink(pipeline) else {
            return Err(PlayerError::Misuse("no video sink present yet".into()));
        };
        sink.set_property("immediate-output", self.enabled);
        if let Some(info) = ctx
            .stream_info
            .values_mut()
            .find(|info| info.source_id == self.source_id)
        {
            info.low_latency = self.enabled;
        }
        Ok(())
    }
}

pub struct SetLowLatency {
    pub enabled: bool,
}

impl PlayerTask for SetLowLatency {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let pipeline = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("pipeline not yet constructed".into()))?;
        let Some(sink) = audio_sink(pipeline) else {
            return Err(PlayerError::Misuse("no audio sink present yet".into()));
        };
        sink.set_property("low-latency", self.enabled);
        Ok(())
    }
}

pub struct SetVideoGeometry {
    pub geometry: crate::context::Geometry,
}

impl PlayerTask for SetVideoGeometry {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        ctx.pending_geometry = Some(self.geometry);
        if let Some(pipeline) = ctx.pipeline.as_ref() {
            if let Some(sink) = video_sink(pipeline) {
                apply_geometry(&sink, self.geometry);
                ctx.pending_geometry = None;
                ctx.geometry_applied = true;
            }
        }
        Ok(())
    }
}

/// Applies a rectangle property the way a westeros-family sink expects
/// it; the exact property name/format is platform specific, so this
/// uses the common `"rectangle"` string convention.
pub fn apply_geometry(sink: &gstreamer::Element, geometry: crate::context::Geometry) {
    let rectangle = format!("{},{},{},{}", geometry.x, geometry.y, geometry.width, geometry.height);
    sink.set_property("rectangle", rectangle);
}

pub struct SetVolume {
    pub volume: f64,
}

impl PlayerTask for SetVolume {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let pipeline = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("pipeline not yet constructed".into()))?;
        pipeline.set_property("volume", self.volume);
        Ok(())
    }
}

pub struct SetMute {
    pub muted: bool,
}

impl PlayerTask for SetMute {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let pipeline = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("pipeline not yet constructed".into()))?;
        pipeline.set_property("mute", self.muted);
        Ok(())
    }
}

/// Delegates to the platform helper untouched. No behavior is asserted
/// here beyond forwarding the call's parameters.
pub struct ProcessAudioGap {
    pub position_ns: i64,
    pub duration_ns: i64,
    pub discontinuity: bool,
    pub is_audio_aac: bool,
    pub platform_helper: Arc<dyn PlatformAudioHelper>,
}

impl PlayerTask for ProcessAudioGap {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let pipeline = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("pipeline not yet constructed".into()))?;
        self.platform_helper.process_audio_gap(
            pipeline,
            self.position_ns,
            self.duration_ns,
            self.discontinuity,
            self.is_audio_aac,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_volume_requires_a_pipeline() {
        let mut ctx = GenericPlayerContext::new(false);
        let mut task = SetVolume { volume: 0.5 };
        assert!(matches!(task.execute(&mut ctx), Err(PlayerError::Misuse(_))));
    }

    #[test]
    fn geometry_is_remembered_pending_when_no_sink_yet() {
        gstreamer::init().ok();
        let mut ctx = GenericPlayerContext::new(false);
        ctx.pipeline = Some(gstreamer::Pipeline::new().upcast());
        let geometry = crate::context::Geometry { x: 0, y: 0, width: 1280, height: 720 };
        let mut task = SetVideoGeometry { geometry };
        task.execute(&mut ctx).unwrap();
        assert_eq!(ctx.pending_geometry, Some(geometry));
        assert!(!ctx.geometry_applied);
    }
}
