//! Web-audio HandleBusMessage, grounded on
//! `tasks/webAudio/HandleBusMessage.cpp`. EOS flushes the pipeline for
//! reuse so a subsequent WriteBuffer doesn't need a fresh player.

use crate::client::WebAudioPlayerClient;
use crate::context::WebAudioContext;
use crate::error::PlayerError;
use crate::webaudio::WebAudioTask;
use gstreamer::prelude::*;
use gstreamer::MessageView;
use rialto_common::WebAudioPlayerState;
use std::sync::Arc;

pub struct HandleWebAudioBusMessage {
    pub message: gstreamer::Message,
    pub client: Arc<dyn WebAudioPlayerClient>,
}

impl WebAudioTask for HandleWebAudioBusMessage {
    fn execute(&mut self, ctx: &mut WebAudioContext) -> Result<(), PlayerError> {
        match self.message.view() {
            MessageView::StateChanged(state_changed) => {
                let is_pipeline = self
                    .message
                    .src()
                    .and_then(|src| src.downcast_ref::<gstreamer::Element>().cloned())
                    .zip(ctx.pipeline.as_ref())
                    .map(|(src, pipeline)| &src == pipeline)
                    .unwrap_or(false);
                if !is_pipeline {
                    return Ok(());
                }
                let mapped = match state_changed.current() {
                    gstreamer::State::Ready | gstreamer::State::Null => Some(WebAudioPlayerState::Idle),
                    gstreamer::State::Paused => Some(WebAudioPlayerState::Paused),
                    gstreamer::State::Playing => Some(WebAudioPlayerState::Playing),
                    gstreamer::State::VoidPending => None,
                };
                if let Some(state) = mapped {
                    self.client.notify_state(state);
                }
            }
            MessageView::Eos(_) => {
                self.client.notify_state(WebAudioPlayerState::EndOfStream);
                if let Some(pipeline) = ctx.pipeline.as_ref() {
                    flush_for_reuse(pipeline)?;
                }
            }
            MessageView::Error(err) => {
                self.client.notify_state(WebAudioPlayerState::Failure);
                return Err(PlayerError::FrameworkFailure(err.error().to_string()));
            }
            MessageView::Warning(warn) => {
                tracing::warn!(error = %warn.error(), debug = ?warn.debug(), "web-audio bus warning");
            }
            _ => {}
        }
        Ok(())
    }
}

/// Flushing seek back to zero, leaving the pipeline PAUSED so a later
/// Play/WriteBuffer can resume without reconstructing the graph.
fn flush_for_reuse(pipeline: &gstreamer::Element) -> Result<(), PlayerError> {
    pipeline
        .seek_simple(
            gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
            gstreamer::ClockTime::ZERO,
        )
        .map_err(|_| PlayerError::FrameworkFailure("web-audio EOS flush-for-reuse seek failed".into()))?;
    pipeline
        .set_state(gstreamer::State::Paused)
        .map_err(|_| PlayerError::FrameworkFailure("web-audio post-EOS PAUSED transition failed".into()))?;
    Ok(())
}
