//! Generic Player facade: the public, non-blocking API surface backed
//! by a single `Worker` thread. Every method here either constructs a
//! task and enqueues it, or — for the handful of calls that must run on
//! the caller's thread directly against the pipeline — reads straight
//! through without touching the Worker at all.

use crate::bus::BusDispatcher;
use crate::client::PlayerClient;
use crate::config::PlayerConfig;
use crate::context::{Geometry, GenericPlayerContext};
use crate::decryption::{DataReader, DecryptionService, NullPlatformAudioHelper, PlatformAudioHelper};
use crate::error::PlayerError;
use crate::protection::ProtectionMetadataAdapter;
use crate::source::RialtoSource;
use crate::tasks::generic::{
    self as tasks, HaveDataPayload, RateChangeCapability,
};
use crate::timers::PositionTimer;
use crate::worker::{Worker, WorkerHandle};
use gstreamer::prelude::*;
use rialto_common::{
    HaveDataStatus, MediaSource, MediaSourceAudio, MediaSourceType, PlaybackStats, RequestId,
    SourceId, VideoGeometry, VideoRequirements,
};
use std::sync::Arc;

/// Below this, a video sink is flagged `secondary-video`.
pub const MIN_PRIMARY_VIDEO_WIDTH: u32 = 1920;
pub const MIN_PRIMARY_VIDEO_HEIGHT: u32 = 1080;

/// Ties the Worker, Bus Dispatcher, and Position Timer together for one
/// session: one `GenericPlayer` per session. Dropping a `GenericPlayer`
/// tears down all three in sequence.
pub struct GenericPlayer {
    worker: Worker,
    handle: WorkerHandle,
    bus: Option<BusDispatcher>,
    position_timer: Option<PositionTimer>,
    client: Arc<dyn PlayerClient>,
    config: Arc<PlayerConfig>,
    protection: Arc<ProtectionMetadataAdapter>,
    platform_helper: Arc<dyn PlatformAudioHelper>,
    rate_capability: Arc<dyn RateChangeCapability>,
    decryption: Option<Arc<dyn DecryptionService>>,
    /// Clone of the pipeline element, kept outside the Worker so the
    /// caller's-thread direct reads (GetVolume/GetStats/GetPosition/
    /// GetImmediateOutput) never wait behind queued tasks.
    /// `gstreamer::Element` is a refcounted GObject, safe to read
    /// concurrently with the Worker thread's own clone.
    pipeline: gstreamer::Element,
}

/// Finds the current video sink element by name convention, mirroring
/// `tasks::generic::controls`'s private helper of the same shape.
/// Geometry, immediate-output, and stats all apply against the video
/// sink's properties.
fn video_sink(pipeline: &gstreamer::Element) -> Option<gstreamer::Element> {
    let bin = pipeline.dynamic_cast_ref::<gstreamer::Bin>()?;
    bin.iterate_recurse()
        .into_iter()
        .find(|el| el.name().to_lowercase().contains("westeros"))
}

/// Connects the pipeline's `"deep-element-added"` signal to `SetupElement`.
/// The framework callback only copies out the element and enqueues a
/// task; it never touches context itself, since it runs on whatever
/// thread GStreamer invokes the signal from. Grounded on the
/// `connect("deep-element-added", ...)` idiom used for interior-element
/// patching in the GStreamer ecosystem.
fn wire_deep_element_added(pipeline: &gstreamer::Element, handle: WorkerHandle) {
    pipeline.connect("deep-element-added", false, move |values| {
        let element = values
            .get(2)
            .and_then(|v| v.get::<gstreamer::Element>().ok());
        if let Some(element) = element {
            handle.enqueue(Box::new(tasks::SetupElement { element }));
        }
        None
    });
}

impl GenericPlayer {
    /// Constructs an empty pipeline and starts the Worker, Bus
    /// Dispatcher, and Position Timer. `video_requirements` decides
    /// `isSecondaryVideo`.
    pub fn new(
        client: Arc<dyn PlayerClient>,
        config: Arc<PlayerConfig>,
        video_requirements: VideoRequirements,
        platform_helper: Arc<dyn PlatformAudioHelper>,
        rate_capability: Arc<dyn RateChangeCapability>,
        decryption: Option<Arc<dyn DecryptionService>>,
    ) -> Result<Self, PlayerError> {
        let is_secondary_video = video_requirements.is_secondary_video();
        let mut ctx = GenericPlayerContext::new(is_secondary_video);

        let pipeline = gstreamer::Pipeline::new();
        let rialto_source = RialtoSource::new();
        let bin: gstreamer::Element = rialto_source.bin.clone().upcast();
        pipeline
            .dynamic_cast_ref::<gstreamer::Bin>()
            .expect("Pipeline is a Bin")
            .add(&bin)
            .map_err(|_| PlayerError::FrameworkFailure("failed to add rialto source bin".into()))?;
        let pipeline_element: gstreamer::Element = pipeline.upcast();
        ctx.pipeline = Some(pipeline_element.clone());
        ctx.source = Some(bin);

        let client_for_terminal = client.clone();
        let worker = Worker::spawn(ctx, move |_ctx, err| {
            client_for_terminal.notify_playback_error(&err.to_string());
        });
        let handle = worker.handle();

        wire_deep_element_added(&pipeline_element, handle.clone());

        let bus_handle = handle.clone();
        let bus_client = client.clone();
        let bus = BusDispatcher::spawn(pipeline_element.clone(), move |message| {
            bus_handle.enqueue(Box::new(tasks::HandleBusMessage {
                message,
                client: bus_client.clone(),
            }));
        });

        let position_timer = Some(PositionTimer::spawn(
            handle.clone(),
            client.clone(),
            config.position_report_period,
        ));

        Ok(GenericPlayer {
            worker,
            handle,
            bus,
            position_timer,
            client,
            config,
            protection: Arc::new(ProtectionMetadataAdapter::new()),
            platform_helper,
            rate_capability,
            decryption,
            pipeline: pipeline_element,
        })
    }

    /// Convenience constructor for a session with no platform
    /// integration wired up; used by tests and by callers that don't
    /// need codec-channel switching or DRM.
    pub fn new_unprivileged(
        client: Arc<dyn PlayerClient>,
        config: Arc<PlayerConfig>,
        video_requirements: VideoRequirements,
    ) -> Result<Self, PlayerError> {
        struct NoInstantRateChange;
        impl RateChangeCapability for NoInstantRateChange {
            fn audio_sink_is_amlhala(&self, _pipeline: &gstreamer::Element) -> bool {
                false
            }
            fn supports_instant_rate_seek(&self, _pipeline: &gstreamer::Element) -> bool {
                false
            }
            fn audio_sink_pad(&self, _pipeline: &gstreamer::Element) -> Option<gstreamer::Pad> {
                None
            }
        }
        Self::new(
            client,
            config,
            video_requirements,
            Arc::new(NullPlatformAudioHelper),
            Arc::new(NoInstantRateChange),
            None,
        )
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    // ---- Enqueued commands ---------------------------------------------

    pub fn attach_source(&self, source_id: SourceId, source: MediaSource, switch_source: bool) {
        self.handle.enqueue(Box::new(tasks::AttachSource {
            source_id,
            source,
            switch_source,
            platform_helper: self.platform_helper.clone(),
        }));
    }

    pub fn remove_source(&self, source_type: MediaSourceType) {
        self.handle.enqueue(Box::new(tasks::RemoveSource {
            source_type,
            client: self.client.clone(),
        }));
    }

    pub fn all_sources_attached(&self) {
        self.handle.enqueue(Box::new(tasks::AllSourcesAttached));
    }

    pub fn play(&self) {
        self.handle.enqueue(Box::new(tasks::Play));
    }

    pub fn pause(&self) {
        self.handle.enqueue(Box::new(tasks::Pause));
    }

    /// Stops the graph and tears down the Bus Dispatcher/Position
    /// Timer. Terminal: the player must not be used after this.
    pub fn stop(mut self) {
        self.handle.enqueue(Box::new(tasks::Stop));
        if let Some(timer) = self.position_timer.take() {
            timer.stop();
        }
        if let Some(bus) = self.bus.take() {
            bus.stop();
        }
        self.worker.stop();
    }

    pub fn set_position(&self, position_ns: i64) {
        self.handle.enqueue(Box::new(tasks::SetPosition {
            position_ns,
            client: self.client.clone(),
        }));
    }

    pub fn flush(&self, source_type: MediaSourceType, reset_time: bool) {
        self.handle.enqueue(Box::new(tasks::Flush {
            source_type,
            reset_time,
            client: self.client.clone(),
        }));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_source_position(
        &self,
        source_type: MediaSourceType,
        position_ns: i64,
        reset_time: bool,
        applied_rate: f64,
        stop_position_ns: Option<i64>,
    ) {
        self.handle.enqueue(Box::new(tasks::SetSourcePosition {
            source_type,
            position_ns,
            reset_time,
            applied_rate,
            stop_position_ns,
            client: self.client.clone(),
        }));
    }

    pub fn set_playback_rate(&self, rate: f64) {
        self.handle.enqueue(Box::new(tasks::SetPlaybackRate {
            rate,
            capability: self.rate_capability.clone(),
        }));
    }

    pub fn set_video_geometry(&self, geometry: VideoGeometry) {
        self.handle.enqueue(Box::new(tasks::SetVideoGeometry {
            geometry: Geometry {
                x: geometry.x,
                y: geometry.y,
                width: geometry.width,
                height: geometry.height,
            },
        }));
    }

    pub fn set_immediate_output(&self, source_id: SourceId, enabled: bool) {
        self.handle
            .enqueue(Box::new(tasks::SetImmediateOutput { source_id, enabled }));
    }

    pub fn set_low_latency(&self, enabled: bool) {
        self.handle.enqueue(Box::new(tasks::SetLowLatency { enabled }));
    }

    pub fn set_volume(&self, volume: f64) {
        self.handle.enqueue(Box::new(tasks::SetVolume { volume }));
    }

    pub fn set_mute(&self, muted: bool) {
        self.handle.enqueue(Box::new(tasks::SetMute { muted }));
    }

    pub fn switch_source(&self, audio_source: MediaSourceAudio) {
        self.handle.enqueue(Box::new(tasks::SwitchSource {
            audio_source,
            platform_helper: self.platform_helper.clone(),
        }));
    }

    pub fn process_audio_gap(
        &self,
        position_ns: i64,
        duration_ns: i64,
        discontinuity: bool,
        is_audio_aac: bool,
    ) {
        self.handle.enqueue(Box::new(tasks::ProcessAudioGap {
            position_ns,
            duration_ns,
            discontinuity,
            is_audio_aac,
            platform_helper: self.platform_helper.clone(),
        }));
    }

    /// HaveData with segments already parsed (in-band path).
    pub fn have_data(&self, status: HaveDataStatus, request_id: RequestId, payload: HaveDataPayload) {
        self.handle.enqueue(Box::new(tasks::HaveData {
            status,
            request_id,
            payload: Some(payload),
            client: self.client.clone(),
            protection: self.protection.clone(),
            decryption: self.decryption.clone(),
            worker: Some(self.handle.clone()),
            config: self.config.clone(),
        }));
    }

    /// HaveData with frames to be pulled back out of shared memory
    /// (shm path).
    pub fn have_data_shm(
        &self,
        status: HaveDataStatus,
        request_id: RequestId,
        reader: Box<dyn DataReader>,
        num_frames: usize,
    ) {
        self.handle.enqueue(Box::new(tasks::HaveData {
            status,
            request_id,
            payload: Some(HaveDataPayload::Shm { reader, num_frames }),
            client: self.client.clone(),
            protection: self.protection.clone(),
            decryption: self.decryption.clone(),
            worker: Some(self.handle.clone()),
            config: self.config.clone(),
        }));
    }

    // ---- Caller's-thread direct reads ------------------------------------

    /// GetPosition: queries the pipeline directly rather than waiting on
    /// the last `PositionTick` report, so this call never blocks behind
    /// queued Worker tasks.
    pub fn get_position(&self) -> Result<i64, PlayerError> {
        self.pipeline
            .query_position::<gstreamer::ClockTime>()
            .map(|t| t.nseconds() as i64)
            .ok_or_else(|| PlayerError::Misuse("position query failed".into()))
    }

    pub fn get_volume(&self) -> f64 {
        self.pipeline.property::<f64>("volume")
    }

    pub fn get_mute(&self) -> bool {
        self.pipeline.property::<bool>("mute")
    }

    pub fn get_stats(&self) -> Result<PlaybackStats, PlayerError> {
        let sink = video_sink(&self.pipeline)
            .ok_or_else(|| PlayerError::Misuse("no video sink present yet".into()))?;
        tasks::get_stats(&sink)
    }

    pub fn get_immediate_output(&self) -> Result<bool, PlayerError> {
        let sink = video_sink(&self.pipeline)
            .ok_or_else(|| PlayerError::Misuse("no video sink present yet".into()))?;
        Ok(sink.property::<bool>("immediate-output"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rialto_common::{NetworkState, PlaybackState, QosInfo, ShmPartitionInfo, WebAudioPlayerState};

    struct NullClient;
    impl PlayerClient for NullClient {
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
        fn notify_buffer_underflow(&self, _source_id: SourceId) {}
        fn notify_source_flushed(&self, _source_id: SourceId) {}
        fn notify_playback_error(&self, _message: &str) {}
    }
    impl crate::client::WebAudioPlayerClient for NullClient {
        fn notify_state(&self, _state: WebAudioPlayerState) {}
    }

    #[test]
    fn min_primary_video_dimensions_are_1080p() {
        assert_eq!(MIN_PRIMARY_VIDEO_WIDTH, 1920);
        assert_eq!(MIN_PRIMARY_VIDEO_HEIGHT, 1080);
    }

    #[test]
    fn new_player_starts_with_an_empty_paused_capable_pipeline() {
        gstreamer::init().ok();
        let client: Arc<dyn PlayerClient> = Arc::new(NullClient);
        let player = GenericPlayer::new_unprivileged(
            client,
            Arc::new(PlayerConfig::default()),
            VideoRequirements { max_width: 3840, max_height: 2160 },
        )
        .expect("player constructs a pipeline");
        player.play();
        player.stop();
    }
}
