//! HaveData completion. Dispatches on `HaveDataStatus`
//! and whatever payload the client attached (an in-band segment vector,
//! or a `DataReader` over shared memory), converts each `MediaSegment`
//! into a buffer, and pushes it through the source's appsrc.

use crate::client::PlayerClient;
use crate::config::PlayerConfig;
use crate::context::GenericPlayerContext;
use crate::decryption::{DataReader, DecryptionService};
use crate::error::PlayerError;
use crate::protection::{ProtectionMetadata, ProtectionMetadataAdapter};
use crate::worker::{PlayerTask, WorkerHandle};
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use rialto_common::{HaveDataStatus, MediaSegment, RequestId};
use std::sync::Arc;

/// The payload a client hands back with HaveData: either the parsed
/// segments in-band, or a signal that frames were written
/// into shared memory and must be read back out through a `DataReader`.
pub enum HaveDataPayload {
    InBand(Vec<MediaSegment>),
    Shm { reader: Box<dyn DataReader>, num_frames: usize },
}

pub struct HaveData {
    pub status: HaveDataStatus,
    pub request_id: RequestId,
    pub payload: Option<HaveDataPayload>,
    pub client: Arc<dyn PlayerClient>,
    pub protection: Arc<ProtectionMetadataAdapter>,
    pub decryption: Option<Arc<dyn DecryptionService>>,
    /// Used only to arm the NeedData resend timer; not read otherwise,
    /// so tests that never hit the Error/NoAvailableSamples
    /// branch can leave this `None`.
    pub worker: Option<WorkerHandle>,
    pub config: Arc<PlayerConfig>,
}

impl PlayerTask for HaveData {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let Some(active) = ctx.active_requests.remove(&self.request_id) else {
            // UNKNOWN type in ActiveRequests: stale, ignore.
            tracing::debug!(request_id = self.request_id, "have_data: stale/unknown request, ignoring");
            return Ok(());
        };
        let source_type = active.source_type;

        match self.status {
            HaveDataStatus::Error | HaveDataStatus::NoAvailableSamples => {
                let low_latency = ctx
                    .stream_info
                    .get(&source_type)
                    .map(|info| info.low_latency)
                    .unwrap_or(false);
                if ctx.resend_timers.try_start(source_type) {
                    if let Some(worker) = &self.worker {
                        let delay = self.config.resend_delay(low_latency);
                        crate::timers::spawn_resend_timer(worker.clone(), self.client.clone(), source_type, delay);
                    }
                    tracing::debug!(?source_type, low_latency, "have_data: scheduling NeedData resend");
                } else {
                    tracing::debug!(?source_type, "have_data: resend timer already active, not starting another");
                }
                return Ok(());
            }
            HaveDataStatus::Ok | HaveDataStatus::Eos => {}
        }

        let segments: Vec<MediaSegment> = match self.payload.take() {
            Some(HaveDataPayload::InBand(segments)) => segments,
            Some(HaveDataPayload::Shm { mut reader, num_frames }) => {
                let mut segments = Vec::with_capacity(num_frames);
                for idx in 0..num_frames {
                    match reader.read(idx) {
                        Some(segment) => segments.push(segment),
                        None => {
                            return Err(PlayerError::ShmCorruption(format!(
                                "data reader exhausted at frame {idx} of {num_frames}"
                            )));
                        }
                    }
                }
                segments
            }
            None => Vec::new(),
        };

        for segment in &segments {
            self.push_segment(ctx, segment)?;
        }

        if self.status == HaveDataStatus::Eos {
            if let Some(info) = ctx.stream_info.get(&source_type) {
                let app_src = info
                    .app_src
                    .clone()
                    .downcast::<AppSrc>()
                    .map_err(|_| PlayerError::FrameworkFailure("stream-info element is not an appsrc".into()))?;
                match app_src.end_of_stream() {
                    Ok(_) | Err(gstreamer::FlowError::Eos) => {}
                    Err(gstreamer::FlowError::Flushing) => {}
                    Err(err) => {
                        return Err(PlayerError::FrameworkFailure(format!("end_of_stream failed: {err:?}")));
                    }
                }
            }
        }

        Ok(())
    }
}

impl HaveData {
    /// Converts one `MediaSegment` into a `gst::Buffer` and pushes it
    /// through the owning appsrc. Caps are updated in place only when
    /// they differ from what's currently attached for that source.
    fn push_segment(&self, ctx: &mut GenericPlayerContext, segment: &MediaSegment) -> Result<(), PlayerError> {
        let source_type = segment.source_type();
        let Some(info) = ctx.stream_info.get_mut(&source_type) else {
            return Err(PlayerError::Misuse(format!("push_segment: no source for {source_type:?}")));
        };

        let segment_caps = crate::caps::build_caps(&segment_as_media_source(segment));
        if info.attached_caps.as_ref() != Some(&segment_caps) {
            let app_src = info
                .app_src
                .clone()
                .downcast::<AppSrc>()
                .map_err(|_| PlayerError::FrameworkFailure("stream-info element is not an appsrc".into()))?;
            app_src.set_caps(Some(&segment_caps));
            info.attached_caps = Some(segment_caps);
        }

        let common = segment.common();
        let mut buffer = gstreamer::Buffer::from_slice(common.data.clone());
        {
            let buffer_mut = buffer.get_mut().ok_or_else(|| {
                PlayerError::ResourceExhaustion("buffer allocation returned a shared (non-unique) buffer".into())
            })?;
            buffer_mut.set_pts(gstreamer::ClockTime::from_nseconds(common.pts.max(0) as u64));
            buffer_mut.set_dts(gstreamer::ClockTime::from_nseconds(common.dts.max(0) as u64));
        }

        if let Some(encryption) = &common.encryption {
            if let Some(service) = &self.decryption {
                let caps = info.attached_caps.clone().unwrap_or_else(gstreamer::Caps::new_empty);
                let status = service.decrypt_with_subsamples(
                    encryption.key_session_id,
                    &mut buffer,
                    &encryption.subsamples,
                    encryption.subsample_count,
                    &encryption.iv,
                    &encryption.key_id,
                    encryption.init_with_last15,
                    &caps,
                );
                if status != crate::decryption::MediaKeyErrorStatus::Ok {
                    // The buffer is still pushed; the status is only logged.
                    tracing::warn!(?status, "decrypt failed, pushing buffer regardless");
                }
            }

            self.protection.add(
                &mut buffer,
                ProtectionMetadata {
                    key_session_id: encryption.key_session_id,
                    subsample_count: encryption.subsample_count,
                    init_with_last15: encryption.init_with_last15,
                    key: gstreamer::Buffer::from_slice(encryption.key_id.clone()),
                    iv: gstreamer::Buffer::from_slice(encryption.iv.clone()),
                    subsamples: gstreamer::Buffer::from_slice(encryption.subsamples.clone()),
                    cipher_mode: encryption.cipher_mode,
                    crypt: encryption.crypt,
                    skip: encryption.skip,
                    encryption_pattern_set: encryption.encryption_pattern_set,
                },
            );
        }

        let app_src = info
            .app_src
            .clone()
            .downcast::<AppSrc>()
            .map_err(|_| PlayerError::FrameworkFailure("stream-info element is not an appsrc".into()))?;

        // UNEXPECTED (post-EOS) and WRONG_STATE are dropped silently.
        match app_src.push_buffer(buffer) {
            Ok(_) | Err(gstreamer::FlowError::Eos) | Err(gstreamer::FlowError::Flushing) => Ok(()),
            Err(err) => Err(PlayerError::FrameworkFailure(format!("push_buffer failed: {err:?}"))),
        }
    }
}

/// Reconstructs a `MediaSource` descriptor from a segment purely to
/// reuse `caps::build_caps`'s dispatch, so appsrc caps can be updated
/// in place when they differ from what's already attached.
fn segment_as_media_source(segment: &MediaSegment) -> rialto_common::MediaSource {
    use rialto_common::{MediaSource, MediaSourceAudio, MediaSourceVideo, MediaSourceVideoDolbyVision};
    match segment {
        MediaSegment::Audio(a) => MediaSource::Audio(MediaSourceAudio {
            mime_type: "audio/mpeg".to_string(),
            channels: a.channels,
            sample_rate: a.sample_rate,
            codec_specific_config: Vec::new(),
            segment_alignment: a.common.segment_alignment,
            stream_format: None,
            codec_data: a.common.codec_data.clone(),
            has_drm: a.common.encryption.is_some(),
        }),
        MediaSegment::Video(v) => MediaSource::Video(MediaSourceVideo {
            mime_type: "video/x-h264".to_string(),
            width: v.width,
            height: v.height,
            frame_rate: v.frame_rate.clone(),
            segment_alignment: v.common.segment_alignment,
            stream_format: None,
            codec_data: v.common.codec_data.clone(),
            has_drm: v.common.encryption.is_some(),
        }),
        MediaSegment::VideoDolbyVision(dv) => MediaSource::VideoDolbyVision(MediaSourceVideoDolbyVision {
            video: MediaSourceVideo {
                mime_type: "video/x-h265".to_string(),
                width: dv.video.width,
                height: dv.video.height,
                frame_rate: dv.video.frame_rate.clone(),
                segment_alignment: dv.video.common.segment_alignment,
                stream_format: None,
                codec_data: dv.video.common.codec_data.clone(),
                has_drm: dv.video.common.encryption.is_some(),
            },
            dolby_vision_profile: dv.dolby_vision_profile,
        }),
        MediaSegment::Subtitle(_) => MediaSource::Audio(MediaSourceAudio {
            mime_type: "text/x-raw".to_string(),
            channels: 0,
            sample_rate: 0,
            codec_specific_config: Vec::new(),
            segment_alignment: rialto_common::SegmentAlignment::None,
            stream_format: None,
            codec_data: None,
            has_drm: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GenericPlayerContext, ActiveRequest, StreamInfo};
    use rialto_common::{MediaSourceType, NetworkState, PlaybackState, QosInfo, ShmPartitionInfo, SourceId, WebAudioPlayerState};

    struct NullClient;
    impl PlayerClient for NullClient {
        fn notify_network_state(&self, _state: NetworkState) {}
        fn notify_playback_state(&self, _state: PlaybackState) {}
        fn notify_position(&self, _position_ns: i64) {}
        fn notify_need_media_data(&self, _source_id: SourceId, _frame_count: u32, _request_id: RequestId, _shm: ShmPartitionInfo) {}
        fn notify_qos(&self, _source_id: SourceId, _info: QosInfo) {}
        fn notify_buffer_underflow(&self, _source_id: SourceId) {}
        fn notify_source_flushed(&self, _source_id: SourceId) {}
        fn notify_playback_error(&self, _message: &str) {}
    }
    impl crate::client::WebAudioPlayerClient for NullClient {
        fn notify_state(&self, _state: WebAudioPlayerState) {}
    }

    #[test]
    fn unknown_request_id_is_ignored_not_errored() {
        gstreamer::init().ok();
        let mut ctx = GenericPlayerContext::new(false);
        let mut task = HaveData {
            status: HaveDataStatus::Ok,
            request_id: 999,
            payload: Some(HaveDataPayload::InBand(vec![])),
            client: Arc::new(NullClient),
            protection: Arc::new(ProtectionMetadataAdapter::new()),
            decryption: None,
            worker: None,
            config: Arc::new(crate::config::PlayerConfig::default()),
        };
        assert!(task.execute(&mut ctx).is_ok());
    }

    #[test]
    fn no_available_samples_starts_resend_timer_once() {
        gstreamer::init().ok();
        let mut ctx = GenericPlayerContext::new(false);
        ctx.stream_info.insert(
            MediaSourceType::Audio,
            StreamInfo {
                source_id: SourceId(1),
                app_src: gstreamer::ElementFactory::make("fakesrc").build().unwrap(),
                has_drm: false,
                attached_caps: None,
                low_latency: false,
            },
        );
        ctx.active_requests.insert(1, ActiveRequest { source_type: MediaSourceType::Audio });
        ctx.active_requests.insert(2, ActiveRequest { source_type: MediaSourceType::Audio });

        let mut first = HaveData {
            status: HaveDataStatus::NoAvailableSamples,
            request_id: 1,
            payload: None,
            client: Arc::new(NullClient),
            protection: Arc::new(ProtectionMetadataAdapter::new()),
            decryption: None,
            worker: None,
            config: Arc::new(crate::config::PlayerConfig::default()),
        };
        first.execute(&mut ctx).unwrap();
        assert!(!ctx.resend_timers.try_start(MediaSourceType::Audio));

        ctx.resend_timers.clear(MediaSourceType::Audio);
        let mut second = HaveData {
            status: HaveDataStatus::Error,
            request_id: 2,
            payload: None,
            client: Arc::new(NullClient),
            protection: Arc::new(ProtectionMetadataAdapter::new()),
            decryption: None,
            worker: None,
            config: Arc::new(crate::config::PlayerConfig::default()),
        };
        second.execute(&mut ctx).unwrap();
        assert!(!ctx.resend_timers.try_start(MediaSourceType::Audio));
    }
}
