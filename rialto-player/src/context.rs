//! Per-session mutable state. Owned exclusively by the Worker thread
//! (see `worker.rs`) — nothing outside a task's `execute` is permitted
//! to touch these fields, which is the "single-mutator" property.

use rialto_common::{RequestId, SourceId};
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Per-source bookkeeping held in `streamInfo`.
pub struct StreamInfo {
    pub source_id: SourceId,
    pub app_src: gstreamer::Element,
    pub has_drm: bool,
    pub attached_caps: Option<gstreamer::Caps>,
    pub low_latency: bool,
}

/// An in-flight NeedData request, tracked so a stray HaveData for an
/// unknown requestId can be recognized and ignored.
#[derive(Debug, Clone, Copy)]
pub struct ActiveRequest {
    pub source_type: rialto_common::MediaSourceType,
}

/// Tracks whether a resend timer is already scheduled for a source, so
/// a second NO_AVAILABLE_SAMPLES doesn't stack a duplicate timer.
#[derive(Default)]
pub struct ResendTimers {
    pending: HashMap<rialto_common::MediaSourceType, ()>,
}

impl ResendTimers {
    pub fn try_start(&mut self, source_type: rialto_common::MediaSourceType) -> bool {
        if self.pending.contains_key(&source_type) {
            false
        } else {
            self.pending.insert(source_type, ());
            true
        }
    }

    pub fn clear(&mut self, source_type: rialto_common::MediaSourceType) {
        self.pending.remove(&source_type);
    }

    pub fn clear_all(&mut self) {
        self.pending.clear();
    }
}

/// Mirrors the original's `PlayerContext`, named `GenericPlayerContext`
/// to disambiguate from `WebAudioContext`.
pub struct GenericPlayerContext {
    pub pipeline: Option<gstreamer::Element>,
    pub source: Option<gstreamer::Element>,
    pub stream_info: HashMap<rialto_common::MediaSourceType, StreamInfo>,
    pub playback_rate: f64,
    pub pending_playback_rate: Option<f64>,
    pub pending_geometry: Option<Geometry>,
    pub is_secondary_video: bool,
    pub last_audio_sample_timestamps: i64,
    pub audio_underflow: bool,
    pub video_underflow: bool,
    pub audio_underflow_ticks: u32,
    /// Opaque per-pipeline bookkeeping handed through to the platform
    /// audio-switch helper untouched.
    pub playback_group: PlaybackGroup,
    pub active_requests: HashMap<RequestId, ActiveRequest>,
    pub next_request_id: RequestId,
    pub resend_timers: ResendTimers,
    pub last_position_report: Option<Instant>,
    pub geometry_applied: bool,
    /// Remembers the audio caps last seen before a RemoveSource(AUDIO),
    /// so a subsequent AttachSource can tell whether it's a plain
    /// reattach or needs the legacy switch path.
    pub removed_audio_caps: Option<gstreamer::Caps>,
    /// Set once the graph first reaches PAUSED. `SetPosition` before
    /// this point just records a start position instead of seeking.
    pub reached_paused_once: bool,
    /// Position recorded by `SetPosition` before the graph has ever
    /// reached PAUSED.
    pub start_position_ns: Option<i64>,
}

#[derive(Debug, Default, Clone)]
pub struct PlaybackGroup {
    pub pipeline_name: Option<String>,
}

impl GenericPlayerContext {
    pub fn new(is_secondary_video: bool) -> Self {
        GenericPlayerContext {
            pipeline: None,
            source: None,
            stream_info: HashMap::new(),
            playback_rate: 1.0,
            pending_playback_rate: None,
            pending_geometry: None,
            is_secondary_video,
            last_audio_sample_timestamps: 0,
            audio_underflow: false,
            video_underflow: false,
            audio_underflow_ticks: 0,
            playback_group: PlaybackGroup::default(),
            active_requests: HashMap::new(),
            next_request_id: 0,
            resend_timers: ResendTimers::default(),
            last_position_report: None,
            geometry_applied: false,
            removed_audio_caps: None,
            reached_paused_once: false,
            start_position_ns: None,
        }
    }

    pub fn next_request_id(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }
}

/// Mirrors the original's `WebAudioContext`. The (mutex, condvar,
/// lastBytesWritten) rendezvous lives in `webaudio.rs` alongside the
/// blocking `write_buffer` call it serves; this struct holds only the
/// pipeline state the Worker mutates.
pub struct WebAudioContext {
    pub pipeline: Option<gstreamer::Element>,
    pub app_src: Option<gstreamer::Element>,
    pub volume_element: Option<gstreamer::Element>,
    pub bytes_per_sample: u32,
    pub pcm_rate: u32,
    /// `PlayerConfig::webaudio_capacity_bytes`, copied in at
    /// construction rather than read through a shared config handle,
    /// matching every other per-session tunable already resolved once
    /// into this context.
    pub capacity_bytes: u32,
}

impl WebAudioContext {
    pub fn new(bytes_per_sample: u32, pcm_rate: u32, capacity_bytes: u32) -> Self {
        WebAudioContext {
            pipeline: None,
            app_src: None,
            volume_element: None,
            bytes_per_sample,
            pcm_rate,
            capacity_bytes,
        }
    }
}
