//! Rialto media-playback orchestration engine: a single-mutator Worker
//! per session driving a GStreamer pipeline, plus a parallel Web-Audio
//! sub-pipeline for the synchronous PCM-write path.

pub mod bus;
pub mod caps;
pub mod client;
pub mod config;
pub mod context;
pub mod decryption;
pub mod error;
pub mod generic;
pub mod profiler;
pub mod protection;
pub mod source;
pub mod tasks;
pub mod timers;
pub mod webaudio;
pub mod worker;

pub use error::{PlayerError, PlayerResult};
pub use generic::GenericPlayer;
