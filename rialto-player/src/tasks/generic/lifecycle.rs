//! State-machine transitions that don't need their own file:
//! AllSourcesAttached, Play, Pause, Stop, RemoveSource.

use crate::client::PlayerClient;
use crate::context::GenericPlayerContext;
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;
use rialto_common::MediaSourceType;
use std::sync::Arc;

fn pipeline_or_misuse(ctx: &GenericPlayerContext) -> Result<&gstreamer::Element, PlayerError> {
    ctx.pipeline
        .as_ref()
        .ok_or_else(|| PlayerError::Misuse("pipeline not yet constructed".into()))
}

/// Marks the source element pad-complete and transitions the graph to
/// PAUSED; must succeed before Play is honored.
pub struct AllSourcesAttached;

impl PlayerTask for AllSourcesAttached {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let pipeline = pipeline_or_misuse(ctx)?;
        pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|_| PlayerError::FrameworkFailure("failed to set PAUSED".into()))?;
        ctx.reached_paused_once = true;
        Ok(())
    }
}

pub struct Play;

impl PlayerTask for Play {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let pipeline = pipeline_or_misuse(ctx)?;
        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|_| PlayerError::FrameworkFailure("failed to set PLAYING".into()))?;
        if let Some(rate) = ctx.pending_playback_rate.take() {
            ctx.playback_rate = rate;
        }
        Ok(())
    }
}

pub struct Pause;

impl PlayerTask for Pause {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let pipeline = pipeline_or_misuse(ctx)?;
        pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|_| PlayerError::FrameworkFailure("failed to set PAUSED".into()))?;
        Ok(())
    }
}

/// Sets the graph to NULL, tears down bus handling, frees the pipeline.
/// Terminal: the player must not be used after this.
pub struct Stop;

impl PlayerTask for Stop {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        if let Some(pipeline) = ctx.pipeline.take() {
            pipeline
                .set_state(gstreamer::State::Null)
                .map_err(|_| PlayerError::FrameworkFailure("failed to set NULL".into()))?;
        }
        ctx.stream_info.clear();
        ctx.active_requests.clear();
        ctx.resend_timers.clear_all();
        Ok(())
    }
}

pub struct RemoveSource {
    pub source_type: MediaSourceType,
    pub client: Arc<dyn PlayerClient>,
}

impl PlayerTask for RemoveSource {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let Some(info) = ctx.stream_info.remove(&self.source_type) else {
            return Err(PlayerError::Misuse(format!(
                "remove_source: no entry for {:?}",
                self.source_type
            )));
        };
        // Audio caps are remembered so a later AttachSource(AUDIO) can
        // tell a plain reattach apart from a codec change.
        if self.source_type == MediaSourceType::Audio {
            ctx.removed_audio_caps = info.attached_caps;
        }
        ctx.resend_timers.clear(self.source_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenericPlayerContext;

    #[test]
    fn lifecycle_tasks_report_misuse_without_pipeline() {
        let mut ctx = GenericPlayerContext::new(false);
        let mut play = Play;
        let err = play.execute(&mut ctx).unwrap_err();
        assert!(matches!(err, PlayerError::Misuse(_)));
    }
}
