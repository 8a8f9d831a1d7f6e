//! Typed task objects. Each struct below is a 1:1 Rust analogue of one
//! of the original's `tasks/generic/*.cpp` or `tasks/webAudio/*.cpp`
//! classes, implementing `PlayerTask`/`WebAudioTask` with an `execute`
//! method rather than the original's virtual `execute()` override.

pub mod generic;
pub mod webaudio;
