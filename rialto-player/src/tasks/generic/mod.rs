//! Generic-player task objects: state transitions, source attach/switch,
//! sample ingest, bus handling, and the optional profiler hook.

mod attach_source;
mod controls;
mod handle_bus_message;
mod have_data;
mod lifecycle;
mod need_data;
mod position_tick;
mod seek;
mod set_playback_rate;
mod setup_element;
mod switch_source;

pub use attach_source::AttachSource;
pub use controls::{
    ProcessAudioGap, SetImmediateOutput, SetLowLatency, SetMute, SetVideoGeometry, SetVolume,
};
pub use handle_bus_message::{get_stats, HandleBusMessage};
pub use have_data::{HaveData, HaveDataPayload};
pub use lifecycle::{AllSourcesAttached, Pause, Play, RemoveSource, Stop};
pub use need_data::{arm_need_data_for_all_sources, issue_need_data, NeedData};
pub use position_tick::PositionTick;
pub use seek::{Flush, SetPosition, SetSourcePosition};
pub use set_playback_rate::{RateChangeCapability, SetPlaybackRate};
pub use setup_element::SetupElement;
pub use switch_source::SwitchSource;
