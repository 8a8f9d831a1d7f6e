//! Play/Pause/SetEos for the web-audio sub-pipeline.

use crate::context::WebAudioContext;
use crate::error::PlayerError;
use crate::webaudio::WebAudioTask;
use gstreamer::prelude::*;

pub struct Play;

impl WebAudioTask for Play {
    fn execute(&mut self, ctx: &mut WebAudioContext) -> Result<(), PlayerError> {
        let pipeline = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("web-audio pipeline not yet constructed".into()))?;
        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|_| PlayerError::FrameworkFailure("web-audio PLAYING transition failed".into()))?;
        Ok(())
    }
}

pub struct Pause;

impl WebAudioTask for Pause {
    fn execute(&mut self, ctx: &mut WebAudioContext) -> Result<(), PlayerError> {
        let pipeline = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("web-audio pipeline not yet constructed".into()))?;
        pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|_| PlayerError::FrameworkFailure("web-audio PAUSED transition failed".into()))?;
        Ok(())
    }
}

/// Marks end-of-stream on the appsrc; the bus EOS this provokes is
/// handled by `HandleWebAudioBusMessage`, which flushes the pipeline for
/// reuse.
pub struct SetEos;

impl WebAudioTask for SetEos {
    fn execute(&mut self, ctx: &mut WebAudioContext) -> Result<(), PlayerError> {
        let app_src = ctx
            .app_src
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("web-audio appsrc not yet constructed".into()))?;
        app_src
            .dynamic_cast_ref::<gstreamer_app::AppSrc>()
            .ok_or_else(|| PlayerError::FrameworkFailure("app_src is not an AppSrc".into()))?
            .end_of_stream()
            .map_err(|_| PlayerError::FrameworkFailure("end-of-stream rejected by appsrc".into()))?;
        Ok(())
    }
}
