//! Callback surface back to the RPC layer. Tasks hold a
//! `Arc<dyn PlayerClient>` rather than a back-reference to the owning
//! player, breaking the ownership cycle a back-reference would create.

use rialto_common::{
    HaveDataStatus, NetworkState, PlaybackState, QosInfo, RequestId, ShmPartitionInfo, SourceId,
    WebAudioPlayerState,
};

/// Notifications a generic or web-audio player pushes to its client.
/// Every method is fire-and-forget from the Worker's perspective: the
/// implementor owns whatever transport would carry these onward (out of
/// scope for this crate).
pub trait PlayerClient: Send + Sync {
    fn notify_network_state(&self, state: NetworkState);
    fn notify_playback_state(&self, state: PlaybackState);
    fn notify_position(&self, position_ns: i64);
    fn notify_need_media_data(
        &self,
        source_id: SourceId,
        frame_count: u32,
        request_id: RequestId,
        shm: ShmPartitionInfo,
    );
    fn notify_qos(&self, source_id: SourceId, info: QosInfo);
    fn notify_buffer_underflow(&self, source_id: SourceId);
    fn notify_source_flushed(&self, source_id: SourceId);
    fn notify_playback_error(&self, message: &str);
}

pub trait WebAudioPlayerClient: Send + Sync {
    fn notify_state(&self, state: WebAudioPlayerState);
}

/// Carried by HaveData.
#[derive(Debug, Clone, Copy)]
pub struct HaveDataResult {
    pub status: HaveDataStatus,
    pub num_frames: u32,
    pub request_id: RequestId,
}
