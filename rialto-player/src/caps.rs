//! Caps construction. The original's `MediaSourceCapsBuilder`/
//! `MediaSourceAudioCapsBuilder`/`MediaSourceVideoCapsBuilder`/
//! `MediaSourceVideoDolbyVisionCapsBuilder` class hierarchy collapses
//! into one function dispatching on the `MediaSource` enum, replacing
//! multi-class inheritance with a single match over tagged variants.

use gstreamer::Caps;
use rialto_common::{MediaSource, MediaSourceAudio, MediaSourceVideo, SegmentAlignment};

fn alignment_str(alignment: SegmentAlignment) -> Option<&'static str> {
    match alignment {
        SegmentAlignment::None => None,
        SegmentAlignment::Nal => Some("nal"),
        SegmentAlignment::Au => Some("au"),
    }
}

/// Applies the fields common to every `MediaSource` variant (alignment,
/// stream-format, codec_data), building a caps struct from scratch
/// since `gstreamer::caps::Builder` is consumed on each `.field()` call.
fn common_caps(mime_type: &str, alignment: SegmentAlignment, stream_format: &Option<String>, codec_data: &Option<Vec<u8>>) -> Caps {
    let mut caps = Caps::new_empty_simple(mime_type);
    {
        let caps_mut = caps.make_mut();
        let structure = caps_mut.structure_mut(0).expect("freshly built caps has one structure");
        if let Some(align) = alignment_str(alignment) {
            structure.set("alignment", align);
        }
        if let Some(sf) = stream_format {
            structure.set("stream-format", sf.as_str());
        }
        if let Some(cd) = codec_data {
            structure.set("codec_data", gstreamer::Buffer::from_slice(cd.clone()));
        }
    }
    caps
}

/// AAC mimes all share the MPEG audio caps base name; rialto collapses
/// `audio/mp4`, `audio/aac`, and `audio/mp4a-latm` onto `audio/mpeg`
/// with `mpegversion=4` rather than keeping the raw mime as the caps
/// name, so a later codec-channel switch can recognize them as AAC by
/// caps name alone.
fn audio_caps_base_name(mime_type: &str) -> &str {
    match mime_type {
        "audio/mp4" | "audio/aac" | "audio/mp4a-latm" => "audio/mpeg",
        other => other,
    }
}

fn build_audio_caps(audio: &MediaSourceAudio) -> Caps {
    if audio.mime_type == "audio/x-opus" {
        // The framework's opus-header-to-caps helper derives caps
        // entirely from codec_specific_config; without a live framework
        // to call, this is the closest static approximation.
        let mut caps = Caps::new_empty_simple("audio/x-opus");
        let structure = caps.make_mut().structure_mut(0).unwrap();
        structure.set("channels", audio.channels as i32);
        structure.set("rate", audio.sample_rate as i32);
        return caps;
    }

    let base_name = audio_caps_base_name(&audio.mime_type);
    let mut caps = common_caps(
        base_name,
        audio.segment_alignment,
        &audio.stream_format,
        &audio.codec_data,
    );
    let structure = caps.make_mut().structure_mut(0).unwrap();
    if base_name == "audio/mpeg" {
        structure.set("channels", audio.channels as i32);
        structure.set("rate", audio.sample_rate as i32);
        structure.set("mpegversion", 4i32);
    } else if base_name == "audio/x-raw" {
        structure.set("format", "S16LE");
        structure.set("layout", "interleaved");
        structure.set("rate", audio.sample_rate as i32);
        structure.set("channels", audio.channels as i32);
    } else {
        structure.set("channels", audio.channels as i32);
        structure.set("rate", audio.sample_rate as i32);
    }
    caps
}

fn build_video_caps(video: &MediaSourceVideo) -> Caps {
    let mut caps = common_caps(
        &video.mime_type,
        video.segment_alignment,
        &video.stream_format,
        &video.codec_data,
    );
    let structure = caps.make_mut().structure_mut(0).unwrap();
    structure.set("width", video.width as i32);
    structure.set("height", video.height as i32);
    if let Some(fr) = &video.frame_rate {
        structure.set(
            "framerate",
            gstreamer::Fraction::new(fr.numerator as i32, fr.denominator as i32),
        );
    }
    caps
}

pub fn build_caps(source: &MediaSource) -> Caps {
    match source {
        MediaSource::Audio(a) => build_audio_caps(a),
        MediaSource::Video(v) => build_video_caps(v),
        MediaSource::VideoDolbyVision(dv) => {
            let mut caps = build_video_caps(&dv.video);
            let structure = caps.make_mut().structure_mut(0).unwrap();
            structure.set("dovi-stream", true);
            structure.set("dv_profile", dv.dolby_vision_profile as i32);
            caps
        }
    }
}

/// The record handed to the platform audio-track-codec-channel-switch
/// helper.
#[derive(Debug, Clone)]
pub struct AudioAttributes {
    pub codec_param: String,
    pub num_channels: u32,
    pub sample_rate: u32,
    pub codec_specific_config: Vec<u8>,
}

/// Derives `codecParam`: the combined `"mp4a.40.2, mp4a.40.5"` string
/// for AAC variants (rialto doesn't distinguish LC from HE-AAC at this
/// layer, so both profile codes are always reported together),
/// `ec-3.A<channels>` for E-AC3. Any other mime is left blank rather
/// than guessed.
pub fn audio_codec_param(mime_type: &str, channels: u32) -> String {
    match mime_type {
        "audio/mp4a-latm" | "audio/mp4" | "audio/aac" => "mp4a.40.2, mp4a.40.5".to_string(),
        "audio/x-eac3" | "audio/eac3" => format!("ec-3.A{channels}"),
        _ => String::new(),
    }
}

pub fn build_audio_attributes(audio: &MediaSourceAudio) -> AudioAttributes {
    AudioAttributes {
        codec_param: audio_codec_param(&audio.mime_type, audio.channels),
        num_channels: audio.channels,
        sample_rate: audio.sample_rate,
        codec_specific_config: audio.codec_specific_config.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aac_codec_param_reports_both_profiles_together() {
        assert_eq!(audio_codec_param("audio/mp4a-latm", 2), "mp4a.40.2, mp4a.40.5");
        assert_eq!(audio_codec_param("audio/mp4", 2), "mp4a.40.2, mp4a.40.5");
        assert_eq!(audio_codec_param("audio/aac", 2), "mp4a.40.2, mp4a.40.5");
    }

    #[test]
    fn aac_mimes_collapse_to_the_mpeg_caps_base_name() {
        gstreamer::init().ok();
        for mime in ["audio/mp4", "audio/aac", "audio/mp4a-latm"] {
            let caps = build_audio_caps(&MediaSourceAudio {
                mime_type: mime.to_string(),
                channels: 2,
                sample_rate: 48000,
                codec_specific_config: Vec::new(),
                segment_alignment: SegmentAlignment::None,
                stream_format: None,
                codec_data: None,
                has_drm: false,
            });
            let structure = caps.structure(0).unwrap();
            assert_eq!(structure.name(), "audio/mpeg");
            assert_eq!(structure.get::<i32>("mpegversion").unwrap(), 4);
        }
    }

    #[test]
    fn eac3_codec_param_includes_channel_count() {
        assert_eq!(audio_codec_param("audio/x-eac3", 6), "ec-3.A6");
    }

    #[test]
    fn unknown_mime_yields_empty_codec_param_not_a_guess() {
        assert_eq!(audio_codec_param("audio/x-opus", 2), "");
    }
}
