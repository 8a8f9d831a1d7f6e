//! Tunables, loaded from an optional TOML file the way
//! `kaleidux-daemon::orchestration::Config` layers a partial file over
//! built-in defaults: every field has a `#[serde(default = "fn")]` so a
//! config naming only one knob still parses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_needdata_resend_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_needdata_resend_delay_low_latency() -> Duration {
    Duration::from_millis(5)
}

fn default_frame_count_prerolling() -> u32 {
    3
}

fn default_frame_count_playing() -> u32 {
    24
}

fn default_position_report_period() -> Duration {
    Duration::from_millis(250)
}

fn default_webaudio_capacity_bytes() -> u32 {
    10 * 1024
}

fn default_writebuffer_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_video_queue_max_bytes() -> u32 {
    8 * 1024 * 1024
}

fn default_audio_queue_max_bytes() -> u32 {
    512 * 1024
}

fn default_subtitle_queue_max_bytes() -> u32 {
    256 * 1024
}

fn default_min_primary_video_width() -> u32 {
    1920
}

fn default_min_primary_video_height() -> u32 {
    1080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlayerConfig {
    #[serde(with = "humantime_serde", default = "default_needdata_resend_delay")]
    pub needdata_resend_delay: Duration,

    #[serde(
        with = "humantime_serde",
        default = "default_needdata_resend_delay_low_latency"
    )]
    pub needdata_resend_delay_low_latency: Duration,

    #[serde(default = "default_frame_count_prerolling")]
    pub frame_count_prerolling: u32,

    #[serde(default = "default_frame_count_playing")]
    pub frame_count_playing: u32,

    #[serde(with = "humantime_serde", default = "default_position_report_period")]
    pub position_report_period: Duration,

    #[serde(default = "default_webaudio_capacity_bytes")]
    pub webaudio_capacity_bytes: u32,

    #[serde(with = "humantime_serde", default = "default_writebuffer_timeout")]
    pub writebuffer_timeout: Duration,

    #[serde(default = "default_video_queue_max_bytes")]
    pub video_queue_max_bytes: u32,

    #[serde(default = "default_audio_queue_max_bytes")]
    pub audio_queue_max_bytes: u32,

    #[serde(default = "default_subtitle_queue_max_bytes")]
    pub subtitle_queue_max_bytes: u32,

    #[serde(default = "default_min_primary_video_width")]
    pub min_primary_video_width: u32,

    #[serde(default = "default_min_primary_video_height")]
    pub min_primary_video_height: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            needdata_resend_delay: default_needdata_resend_delay(),
            needdata_resend_delay_low_latency: default_needdata_resend_delay_low_latency(),
            frame_count_prerolling: default_frame_count_prerolling(),
            frame_count_playing: default_frame_count_playing(),
            position_report_period: default_position_report_period(),
            webaudio_capacity_bytes: default_webaudio_capacity_bytes(),
            writebuffer_timeout: default_writebuffer_timeout(),
            video_queue_max_bytes: default_video_queue_max_bytes(),
            audio_queue_max_bytes: default_audio_queue_max_bytes(),
            subtitle_queue_max_bytes: default_subtitle_queue_max_bytes(),
            min_primary_video_width: default_min_primary_video_width(),
            min_primary_video_height: default_min_primary_video_height(),
        }
    }
}

impl PlayerConfig {
    /// Loads `path` if it exists, falling back to defaults for any
    /// section that fails to parse rather than aborting the whole load
    /// (mirrors the teacher's per-section tolerance in `Config::load`).
    pub fn load(path: &std::path::Path) -> Self {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&contents) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(?err, path = %path.display(), "failed to parse player config, using defaults");
                Self::default()
            }
        }
    }

    pub fn resend_delay(&self, low_latency: bool) -> Duration {
        if low_latency {
            self.needdata_resend_delay_low_latency
        } else {
            self.needdata_resend_delay
        }
    }

    pub fn frame_count(&self, playing: bool) -> u32 {
        if playing {
            self.frame_count_playing
        } else {
            self.frame_count_prerolling
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = PlayerConfig::default();
        assert_eq!(cfg.needdata_resend_delay, Duration::from_millis(100));
        assert_eq!(cfg.needdata_resend_delay_low_latency, Duration::from_millis(5));
        assert_eq!(cfg.frame_count_prerolling, 3);
        assert_eq!(cfg.frame_count_playing, 24);
        assert_eq!(cfg.webaudio_capacity_bytes, 10 * 1024);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = PlayerConfig::load(std::path::Path::new("/nonexistent/rialto.toml"));
        assert_eq!(cfg.frame_count_playing, 24);
    }
}
