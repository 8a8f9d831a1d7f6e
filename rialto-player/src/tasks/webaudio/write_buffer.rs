//! WriteBuffer: pushes as many bytes as fit below the appsrc's configured
//! capacity less its current queued level, bounded to a whole number of
//! `bytesPerSample`, consuming `main` before spilling into `wrap`.
//! Pushed byte count is handed back to the blocking caller through
//! `crate::webaudio::WriteRendezvous` rather than as a return value,
//! since `WebAudioTask::execute` has none.

use crate::context::WebAudioContext;
use crate::error::PlayerError;
use crate::webaudio::{WebAudioTask, WriteRendezvous};
use gstreamer::prelude::*;
use std::sync::Arc;

pub struct WriteBufferResult {
    pub bytes_written: u32,
}

pub struct WriteBuffer {
    pub main: Vec<u8>,
    pub wrap: Vec<u8>,
    pub rendezvous: Arc<WriteRendezvous>,
}

impl WebAudioTask for WriteBuffer {
    fn execute(&mut self, ctx: &mut WebAudioContext) -> Result<(), PlayerError> {
        let app_src = ctx
            .app_src
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("web-audio appsrc not yet constructed".into()))?
            .dynamic_cast_ref::<gstreamer_app::AppSrc>()
            .ok_or_else(|| PlayerError::FrameworkFailure("app_src is not an AppSrc".into()))?
            .clone();

        let bytes_per_sample = ctx.bytes_per_sample.max(1) as usize;
        let current_level = app_src.current_level_bytes() as usize;
        let mut available = (ctx.capacity_bytes as usize).saturating_sub(current_level);
        available -= available % bytes_per_sample;

        let pushed = push_bounded(&app_src, &self.main, available, bytes_per_sample);
        let pushed = match pushed {
            Ok(n) => n,
            Err(_) => {
                self.rendezvous.publish(0);
                return Err(PlayerError::FrameworkFailure("appsrc rejected main buffer push".into()));
            }
        };
        available -= pushed;

        let mut total = pushed;
        if available > 0 && !self.wrap.is_empty() {
            match push_bounded(&app_src, &self.wrap, available, bytes_per_sample) {
                Ok(n) => total += n,
                Err(_) => {
                    // main already went through; report what actually landed.
                    self.rendezvous.publish(total as u32);
                    return Err(PlayerError::FrameworkFailure(
                        "appsrc rejected wrap buffer push".into(),
                    ));
                }
            }
        }

        self.rendezvous.publish(total as u32);
        Ok(())
    }
}

fn push_bounded(
    app_src: &gstreamer_app::AppSrc,
    data: &[u8],
    limit: usize,
    bytes_per_sample: usize,
) -> Result<usize, gstreamer::FlowError> {
    let mut take = data.len().min(limit);
    take -= take % bytes_per_sample;
    if take == 0 {
        return Ok(0);
    }
    let buffer = gstreamer::Buffer::from_slice(data[..take].to_vec());
    app_src.push_buffer(buffer)?;
    Ok(take)
}
