//! SetPosition, Flush, SetSourcePosition.

use super::need_data::arm_need_data_for_all_sources;
use crate::client::PlayerClient;
use crate::context::GenericPlayerContext;
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;
use rialto_common::{MediaSourceType, SourceId};
use std::sync::Arc;

pub struct SetPosition {
    pub position_ns: i64,
    pub client: Arc<dyn PlayerClient>,
}

impl PlayerTask for SetPosition {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        if !ctx.reached_paused_once {
            ctx.start_position_ns = Some(self.position_ns);
            return Ok(());
        }

        let pipeline = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("pipeline not yet constructed".into()))?;

        let flags = gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT;
        pipeline
            .seek_simple(flags, gstreamer::ClockTime::from_nseconds(self.position_ns.max(0) as u64))
            .map_err(|_| PlayerError::FrameworkFailure("seek failed".into()))?;

        arm_need_data_for_all_sources(ctx, &self.client);
        Ok(())
    }
}

pub struct Flush {
    pub source_type: MediaSourceType,
    pub reset_time: bool,
    pub client: Arc<dyn PlayerClient>,
}

impl PlayerTask for Flush {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let info = ctx
            .stream_info
            .get(&self.source_type)
            .ok_or_else(|| PlayerError::Misuse(format!("flush: no source for {:?}", self.source_type)))?;

        let pad = info
            .app_src
            .static_pad("src")
            .ok_or_else(|| PlayerError::FrameworkFailure("appsrc has no src pad".into()))?;

        pad.send_event(gstreamer::event::FlushStart::new());
        pad.send_event(gstreamer::event::FlushStop::new(self.reset_time));

        let source_id = info.source_id;
        self.client.notify_source_flushed(source_id);
        Ok(())
    }
}

pub struct SetSourcePosition {
    pub source_type: MediaSourceType,
    pub position_ns: i64,
    pub reset_time: bool,
    pub applied_rate: f64,
    pub stop_position_ns: Option<i64>,
    pub client: Arc<dyn PlayerClient>,
}

impl PlayerTask for SetSourcePosition {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let info = ctx
            .stream_info
            .get(&self.source_type)
            .ok_or_else(|| PlayerError::Misuse(format!("set_source_position: no source for {:?}", self.source_type)))?;

        let start = gstreamer::GenericFormattedValue::from(gstreamer::ClockTime::from_nseconds(
            self.position_ns.max(0) as u64,
        ));
        let stop = self
            .stop_position_ns
            .map(|p| gstreamer::ClockTime::from_nseconds(p.max(0) as u64))
            .unwrap_or(gstreamer::ClockTime::NONE.unwrap_or(gstreamer::ClockTime::ZERO));

        let segment_event = gstreamer::event::Segment::builder(&{
            let mut seg = gstreamer::FormattedSegment::<gstreamer::ClockTime>::new();
            seg.set_start(gstreamer::ClockTime::from_nseconds(self.position_ns.max(0) as u64));
            seg.set_stop(stop);
            seg.set_rate(self.applied_rate);
            seg
        })
        .build();
        let _ = start;

        let pad = info
            .app_src
            .static_pad("src")
            .ok_or_else(|| PlayerError::FrameworkFailure("appsrc has no src pad".into()))?;
        pad.send_event(segment_event);

        let source_id = info.source_id;
        arm_need_data_for_source(ctx, source_id, self.source_type, &self.client);
        Ok(())
    }
}

fn arm_need_data_for_source(
    ctx: &mut GenericPlayerContext,
    _source_id: SourceId,
    source_type: MediaSourceType,
    client: &Arc<dyn PlayerClient>,
) {
    super::need_data::issue_need_data(ctx, source_type, client, false);
}
