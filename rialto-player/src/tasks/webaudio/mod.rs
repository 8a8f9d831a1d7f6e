//! Web-Audio task objects. Mirrors `tasks/generic` in shape: one struct
//! per command, executed exclusively by `crate::webaudio::WebAudioWorker`.

mod bus_message;
mod lifecycle;
mod volume;
mod write_buffer;

pub use bus_message::HandleWebAudioBusMessage;
pub use lifecycle::{Play, Pause, SetEos};
pub use volume::SetVolume;
pub use write_buffer::{WriteBuffer, WriteBufferResult};
