//! PositionTick: enqueued periodically by the position/underflow timer
//! while PLAYING. Reports position and latches `audioUnderflow` after
//! two consecutive empty-queue ticks.

use crate::client::PlayerClient;
use crate::context::GenericPlayerContext;
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;
use rialto_common::MediaSourceType;
use std::sync::Arc;
use std::time::Instant;

pub struct PositionTick {
    pub client: Arc<dyn PlayerClient>,
}

impl PlayerTask for PositionTick {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let Some(pipeline) = ctx.pipeline.clone() else {
            return Ok(());
        };
        if pipeline.current_state() != gstreamer::State::Playing {
            return Ok(());
        }

        if let Some(position) = pipeline.query_position::<gstreamer::ClockTime>() {
            self.client.notify_position(position.nseconds() as i64);
            ctx.last_position_report = Some(Instant::now());
        }

        let Some(audio) = ctx.stream_info.get(&MediaSourceType::Audio) else {
            return Ok(());
        };
        let queued = audio.app_src.property::<u64>("current-level-bytes");
        let source_id = audio.source_id;

        if queued == 0 {
            ctx.audio_underflow_ticks = ctx.audio_underflow_ticks.saturating_add(1);
            if ctx.audio_underflow_ticks >= 2 && !ctx.audio_underflow {
                ctx.audio_underflow = true;
                self.client.notify_buffer_underflow(source_id);
            }
        } else {
            ctx.audio_underflow_ticks = 0;
            ctx.audio_underflow = false;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StreamInfo;
    use rialto_common::{NetworkState, PlaybackState, QosInfo, RequestId, ShmPartitionInfo, SourceId};

    struct RecordingClient {
        underflows: std::sync::Mutex<Vec<SourceId>>,
    }
    impl PlayerClient for RecordingClient {
        fn notify_network_state(&self, _state: NetworkState) {}
        fn notify_playback_state(&self, _state: PlaybackState) {}
        fn notify_position(&self, _position_ns: i64) {}
        fn notify_need_media_data(
            &self,
            _source_id: SourceId,
            _frame_count: u32,
            _request_id: RequestId,
            _shm: ShmPartitionInfo,
        ) {
        }
        fn notify_qos(&self, _source_id: SourceId, _info: QosInfo) {}
        fn notify_buffer_underflow(&self, source_id: SourceId) {
            self.underflows.lock().unwrap().push(source_id);
        }
        fn notify_source_flushed(&self, _source_id: SourceId) {}
        fn notify_playback_error(&self, _message: &str) {}
    }

    #[test]
    fn underflow_latches_after_two_empty_ticks() {
        gstreamer::init().ok();
        let mut ctx = GenericPlayerContext::new(false);
        let pipeline: gstreamer::Element = gstreamer::Pipeline::new().upcast();
        pipeline.set_state(gstreamer::State::Playing).unwrap();
        ctx.pipeline = Some(pipeline);

        let app_src = gstreamer::ElementFactory::make("appsrc").build().unwrap();
        ctx.stream_info.insert(
            MediaSourceType::Audio,
            StreamInfo {
                source_id: SourceId(1),
                app_src,
                has_drm: false,
                attached_caps: None,
                low_latency: false,
            },
        );

        let client = Arc::new(RecordingClient { underflows: std::sync::Mutex::new(Vec::new()) });
        let mut task = PositionTick { client: client.clone() };
        task.execute(&mut ctx).unwrap();
        assert_eq!(ctx.audio_underflow_ticks, 1);
        assert!(!ctx.audio_underflow);

        task.execute(&mut ctx).unwrap();
        assert_eq!(ctx.audio_underflow_ticks, 2);
        assert!(ctx.audio_underflow);
        assert_eq!(client.underflows.lock().unwrap().len(), 1);

        // A third tick must not re-latch / re-notify.
        task.execute(&mut ctx).unwrap();
        assert_eq!(client.underflows.lock().unwrap().len(), 1);
    }
}
