//! SetVolume for the web-audio sub-pipeline. Getting the volume is a
//! direct read against the pipeline on the caller's thread, so it lives
//! as `crate::webaudio::get_volume` rather than here.

use crate::context::WebAudioContext;
use crate::error::PlayerError;
use crate::webaudio::WebAudioTask;
use gstreamer::prelude::*;

pub struct SetVolume {
    pub volume: f64,
}

impl WebAudioTask for SetVolume {
    fn execute(&mut self, ctx: &mut WebAudioContext) -> Result<(), PlayerError> {
        let element = ctx
            .volume_element
            .as_ref()
            .ok_or_else(|| PlayerError::Misuse("web-audio pipeline not yet constructed".into()))?;
        element.set_property("volume", self.volume);
        Ok(())
    }
}
