//! SetPlaybackRate. Three distinct mechanisms depending on the audio
//! sink and platform capability, tried in order until one applies.

use crate::context::GenericPlayerContext;
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;

/// Platform capability probed once per pipeline: whether an
/// `INSTANT_RATE_CHANGE` seek is supported, and whether the audio sink
/// is an amlhalasink. Grounded on
/// `RdkGstreamerUtilsWrapper::supportsInstantRateChange`; there's no
/// single concrete query for this across platforms, so it's modelled
/// as a trait the caller supplies rather than guessed at.
pub trait RateChangeCapability: Send + Sync {
    fn audio_sink_is_amlhala(&self, pipeline: &gstreamer::Element) -> bool;
    fn supports_instant_rate_seek(&self, pipeline: &gstreamer::Element) -> bool;
    fn audio_sink_pad(&self, pipeline: &gstreamer::Element) -> Option<gstreamer::Pad>;
}

pub struct SetPlaybackRate {
    pub rate: f64,
    pub capability: std::sync::Arc<dyn RateChangeCapability>,
}

impl PlayerTask for SetPlaybackRate {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        if ctx.playback_rate == self.rate {
            return Ok(());
        }

        let Some(pipeline) = ctx.pipeline.clone() else {
            ctx.pending_playback_rate = Some(self.rate);
            return Ok(());
        };
        if pipeline.current_state() != gstreamer::State::Playing {
            ctx.pending_playback_rate = Some(self.rate);
            return Ok(());
        }

        if self.capability.audio_sink_is_amlhala(&pipeline) {
            let pad = self
                .capability
                .audio_sink_pad(&pipeline)
                .ok_or_else(|| PlayerError::FrameworkFailure("amlhalasink has no sink pad".into()))?;
            let segment_event = gstreamer::event::Segment::builder(&{
                let mut seg = gstreamer::FormattedSegment::<gstreamer::ClockTime>::new();
                seg.set_rate(self.rate);
                seg
            })
            .build();
            if !pad.send_event(segment_event) {
                return Err(PlayerError::FrameworkFailure("SEGMENT event rejected by audio sink pad".into()));
            }
        } else if self.capability.supports_instant_rate_seek(&pipeline) {
            pipeline
                .seek(
                    self.rate,
                    gstreamer::SeekFlags::INSTANT_RATE_CHANGE,
                    gstreamer::SeekType::None,
                    gstreamer::ClockTime::NONE,
                    gstreamer::SeekType::None,
                    gstreamer::ClockTime::NONE,
                )
                .map_err(|_| PlayerError::FrameworkFailure("instant rate-change seek failed".into()))?;
        } else {
            let structure = gstreamer::Structure::builder("custom-instant-rate-change")
                .field("rate", self.rate)
                .build();
            let event = gstreamer::event::CustomDownstreamOob::new(structure);
            if !pipeline.send_event(event) {
                return Err(PlayerError::FrameworkFailure(
                    "custom-instant-rate-change event rejected".into(),
                ));
            }
        }

        ctx.playback_rate = self.rate;
        ctx.pending_playback_rate = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverAmlhalaNoInstantSeek;
    impl RateChangeCapability for NeverAmlhalaNoInstantSeek {
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

    #[test]
    fn same_rate_is_a_no_op() {
        let mut ctx = GenericPlayerContext::new(false);
        ctx.playback_rate = 1.0;
        let mut task = SetPlaybackRate {
            rate: 1.0,
            capability: std::sync::Arc::new(NeverAmlhalaNoInstantSeek),
        };
        task.execute(&mut ctx).unwrap();
        assert_eq!(ctx.playback_rate, 1.0);
        assert!(ctx.pending_playback_rate.is_none());
    }

    #[test]
    fn rate_before_playing_is_recorded_as_pending() {
        let mut ctx = GenericPlayerContext::new(false);
        let mut task = SetPlaybackRate {
            rate: 2.0,
            capability: std::sync::Arc::new(NeverAmlhalaNoInstantSeek),
        };
        task.execute(&mut ctx).unwrap();
        assert_eq!(ctx.pending_playback_rate, Some(2.0));
        assert_eq!(ctx.playback_rate, 1.0);
    }
}
