//! HandleBusMessage. Enqueued by the bus dispatcher thread (`crate::bus`),
//! never executed inline on the bus thread itself — only the Worker
//! mutates context or calls the client.

use crate::client::PlayerClient;
use crate::context::GenericPlayerContext;
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;
use gstreamer::MessageView;
use rialto_common::{MediaSourceType, NetworkState, PlaybackState, PlaybackStats, QosInfo, SourceId};
use std::sync::Arc;

pub struct HandleBusMessage {
    pub message: gstreamer::Message,
    pub client: Arc<dyn PlayerClient>,
}

impl PlayerTask for HandleBusMessage {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        match self.message.view() {
            MessageView::StateChanged(state_changed) => {
                // Only the pipeline's own state changes are client-visible;
                // child-element state changes are not mapped.
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

                let new = state_changed.current();
                let pending = state_changed.pending();

                // PAUSED with pending==PAUSED is a pre-roll marker, not
                // reported.
                if new == gstreamer::State::Paused && pending == gstreamer::State::Paused {
                    return Ok(());
                }

                let mapped = match new {
                    gstreamer::State::Ready => Some(PlaybackState::Idle),
                    gstreamer::State::Paused => Some(PlaybackState::Paused),
                    gstreamer::State::Playing => Some(PlaybackState::Playing),
                    gstreamer::State::Null => Some(PlaybackState::Stopped),
                    gstreamer::State::VoidPending => None,
                };
                if let Some(state) = mapped {
                    self.client.notify_playback_state(state);
                    if state == PlaybackState::Idle {
                        self.client.notify_network_state(NetworkState::Buffered);
                    }
                }
            }
            MessageView::Eos(_) => {
                self.client.notify_playback_state(PlaybackState::EndOfStream);
            }
            MessageView::Qos(qos) => {
                let (_live, running_time, stream_time, timestamp, duration) = qos.get();
                let (_format, processed, dropped) = qos.stats();
                let _ = (running_time, stream_time, timestamp, duration);
                let source_id = infer_source_id_from_qos(ctx, &self.message);
                self.client.notify_qos(
                    source_id,
                    QosInfo {
                        processed,
                        dropped,
                    },
                );
            }
            MessageView::Error(err) => {
                self.client.notify_playback_error(&err.error().to_string());
                self.client.notify_playback_state(PlaybackState::Failure);
                return Err(PlayerError::FrameworkFailure(err.error().to_string()));
            }
            MessageView::Warning(warn) => {
                tracing::warn!(error = %warn.error(), debug = ?warn.debug(), "bus warning");
            }
            _ => {}
        }
        Ok(())
    }
}

/// Infers which source a QOS message pertains to from the element-class
/// metadata string ("Audio" vs "Video").
fn infer_source_id_from_qos(ctx: &GenericPlayerContext, message: &gstreamer::Message) -> SourceId {
    let class = message
        .src()
        .and_then(|src| src.downcast_ref::<gstreamer::Element>().cloned())
        .and_then(|el| el.factory())
        .and_then(|factory| factory.metadata(gstreamer::ELEMENT_METADATA_KLASS).map(str::to_string))
        .unwrap_or_default();

    let source_type = if class.contains("Video") {
        MediaSourceType::Video
    } else {
        MediaSourceType::Audio
    };

    ctx.stream_info
        .get(&source_type)
        .map(|info| info.source_id)
        .unwrap_or(SourceId(-1))
}

/// GetStats: `{rendered, dropped}` parsed from the video sink's `stats`
/// structure. Runs on the caller's thread rather than the Worker, so
/// this is a plain function rather than a `PlayerTask`.
pub fn get_stats(video_sink: &gstreamer::Element) -> Result<PlaybackStats, PlayerError> {
    let stats = video_sink.property::<gstreamer::Structure>("stats");
    let rendered = stats.get::<u64>("rendered").unwrap_or(0);
    let dropped = stats.get::<u64>("dropped").unwrap_or(0);
    Ok(PlaybackStats { rendered, dropped })
}
