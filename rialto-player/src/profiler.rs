//! Profiler. Grounded on `GstProfiler.h`/`GstProfiler.cpp`: installs a
//! one-shot pad probe on an element's src pad that records a single
//! stage label and removes itself after the first buffer. When the
//! `tracing` subscriber has no active layer this is a no-op in
//! practice, so there's no separate enable/disable knob.

use gstreamer::prelude::*;

/// Installs the probe. Safe to call repeatedly for the same element;
/// each call installs (and self-removes) its own probe independently.
pub fn trace_first_buffer(element: &gstreamer::Element, label: impl Into<String>) {
    let Some(pad) = element.static_pad("src") else {
        tracing::debug!(element = %element.name(), "profiler: element has no src pad");
        return;
    };
    let label = label.into();
    pad.add_probe(gstreamer::PadProbeType::BUFFER, move |_pad, _info| {
        tracing::info!(stage = %label, "profiler");
        gstreamer::PadProbeReturn::Remove
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_installs_on_an_element_with_a_src_pad() {
        gstreamer::init().ok();
        let element = gstreamer::ElementFactory::make("fakesrc").build().unwrap();
        trace_first_buffer(&element, "decode-start");
    }

    #[test]
    fn missing_src_pad_is_a_silent_no_op() {
        gstreamer::init().ok();
        let element = gstreamer::ElementFactory::make("fakesink").build().unwrap();
        trace_first_buffer(&element, "unused-label");
    }
}
