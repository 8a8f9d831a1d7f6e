//! SetupElement: reacts to a newly-added pipeline element (forwarded
//! from the media framework's `deep-element-added` signal, which only
//! enqueues this task with the element's name copied out — no context
//! reads on the framework thread).
//!
//! The first time a video sink appears (name-prefix match, e.g. a
//! "westeros" family sink), `pendingGeometry` is applied and, if the
//! session is secondary-video, the `secondary-video` property is set
//! *before* geometry.

use super::controls::apply_geometry;
use crate::context::GenericPlayerContext;
use crate::error::PlayerError;
use crate::worker::PlayerTask;
use gstreamer::prelude::*;

/// Name prefixes recognized as video sinks.
const VIDEO_SINK_NAME_PREFIXES: &[&str] = &["westeros"];

pub fn is_video_sink_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIDEO_SINK_NAME_PREFIXES.iter().any(|prefix| lower.starts_with(prefix) || lower.contains(prefix))
}

pub struct SetupElement {
    pub element: gstreamer::Element,
}

impl PlayerTask for SetupElement {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
        let name = self.element.name();
        if !is_video_sink_name(&name) {
            return Ok(());
        }
        if ctx.geometry_applied {
            return Ok(());
        }

        if ctx.is_secondary_video {
            self.element.set_property("secondary-video", true);
        }
        if let Some(geometry) = ctx.pending_geometry.take() {
            apply_geometry(&self.element, geometry);
        }
        ctx.geometry_applied = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_westeros_family_names() {
        assert!(is_video_sink_name("westerossink"));
        assert!(is_video_sink_name("westerossink0"));
        assert!(!is_video_sink_name("amlhalasink"));
    }

    #[test]
    fn geometry_applied_exactly_once() {
        gstreamer::init().ok();
        let mut ctx = GenericPlayerContext::new(false);
        ctx.pending_geometry = Some(crate::context::Geometry { x: 1, y: 2, width: 3, height: 4 });
        let sink = gstreamer::ElementFactory::make("fakesink")
            .name("westerossink")
            .build()
            .unwrap();
        let mut task = SetupElement { element: sink.clone() };
        task.execute(&mut ctx).unwrap();
        assert!(ctx.pending_geometry.is_none());
        assert!(ctx.geometry_applied);

        // A second video sink appearing (e.g. secondary pipeline) must
        // not re-consume a geometry that's already been applied.
        ctx.pending_geometry = Some(crate::context::Geometry { x: 9, y: 9, width: 9, height: 9 });
        let mut second = SetupElement { element: sink };
        second.execute(&mut ctx).unwrap();
        assert_eq!(
            ctx.pending_geometry,
            Some(crate::context::Geometry { x: 9, y: 9, width: 9, height: 9 })
        );
    }
}
