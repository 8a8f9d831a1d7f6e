//! Web-Audio sub-pipeline: a small appsrc → audioconvert →
//! audioresample → volume → sink graph fed synchronously via
//! `write_buffer`, grounded on `GstWebAudioPlayer.cpp`/`.h` and
//! `WebAudioPlayerContext.h`. Runs its own single-mutator Worker rather
//! than reusing `crate::worker::Worker`, since that one is hard-wired to
//! `GenericPlayerContext` the same way the original keeps two distinct
//! player classes instead of one generic over context type.

use crate::context::WebAudioContext;
use crate::error::PlayerError;
use gstreamer::prelude::*;
use rialto_common::{WebAudioBufferAvailable, WebAudioDeviceInfo, WebAudioPcmConfig};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Byte offset reported as the start of the "main" region in
/// `GetBufferAvailable`. The shared-memory partition's actual byte
/// layout is an external collaborator concern; this crate only needs
/// to report offsets consistent with that contract, not back them with
/// real shm.
pub const WEBAUDIO_PARTITION_HEADER_BYTES: u64 = 1024 * 1024;

/// A unit of work executed with exclusive access to a `WebAudioContext`.
pub trait WebAudioTask: Send {
    fn execute(&mut self, ctx: &mut WebAudioContext) -> Result<(), PlayerError>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

enum Job {
    Task(Box<dyn WebAudioTask>),
    Ping(Box<dyn FnOnce() + Send>),
    Shutdown,
}

#[derive(Clone)]
pub struct WebAudioWorkerHandle {
    sender: Sender<Job>,
}

pub struct WebAudioWorker {
    handle: WebAudioWorkerHandle,
    join: Option<JoinHandle<()>>,
}

impl WebAudioWorker {
    pub fn spawn(
        mut ctx: WebAudioContext,
        mut on_terminal_error: impl FnMut(&mut WebAudioContext, PlayerError) + Send + 'static,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let join = std::thread::Builder::new()
            .name("rialto-webaudio-worker".into())
            .spawn(move || {
                for job in receiver {
                    match job {
                        Job::Task(mut task) => {
                            let name = task.name();
                            if let Err(err) = task.execute(&mut ctx) {
                                tracing::warn!(task = name, error = %err, "web-audio task failed");
                                if err.is_terminal() {
                                    on_terminal_error(&mut ctx, err);
                                }
                            }
                        }
                        Job::Ping(handler) => handler(),
                        Job::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn rialto-webaudio-worker thread");

        WebAudioWorker {
            handle: WebAudioWorkerHandle { sender },
            join: Some(join),
        }
    }

    pub fn handle(&self) -> WebAudioWorkerHandle {
        self.handle.clone()
    }

    pub fn stop(mut self) {
        let _ = self.handle.sender.send(Job::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl WebAudioWorkerHandle {
    pub fn enqueue(&self, task: Box<dyn WebAudioTask>) {
        let _ = self.sender.send(Job::Task(task));
    }

    pub fn ping(&self, handler: impl FnOnce() + Send + 'static) {
        let _ = self.sender.send(Job::Ping(Box::new(handler)));
    }
}

/// Makes `WriteBuffer` synchronous: the
/// calling thread blocks on `wait` until the Worker has executed the
/// `WriteBuffer` task and published how many bytes actually landed, or
/// until `PlayerConfig::writebuffer_timeout` elapses.
pub struct WriteRendezvous {
    last_bytes_written: Mutex<Option<u32>>,
    condvar: Condvar,
}

impl WriteRendezvous {
    pub fn new() -> Arc<Self> {
        Arc::new(WriteRendezvous {
            last_bytes_written: Mutex::new(None),
            condvar: Condvar::new(),
        })
    }

    pub fn publish(&self, bytes_written: u32) {
        let mut guard = self.last_bytes_written.lock().unwrap();
        *guard = Some(bytes_written);
        self.condvar.notify_all();
    }

    /// Returns `None` on timeout, treating a stuck write the same as a
    /// failed push (zero bytes pushed).
    pub fn wait(&self, timeout: Duration) -> Option<u32> {
        let guard = self.last_bytes_written.lock().unwrap();
        let (mut guard, _timed_out) = self
            .condvar
            .wait_timeout_while(guard, timeout, |value| value.is_none())
            .unwrap();
        guard.take()
    }
}

/// Probed in order; the first element factory that exists wins. No
/// platform capability query is named for web audio the way
/// `RateChangeCapability` is for the generic player, so this mirrors
/// the generic player's westeros/amlhala naming convention.
const AUDIO_SINK_CANDIDATES: &[&str] = &["amlhalasink", "rtkaudiosink", "autoaudiosink"];

fn caps_for_pcm(pcm: &WebAudioPcmConfig) -> gstreamer::Caps {
    let format = match (pcm.is_float, pcm.sample_size, pcm.is_signed, pcm.is_big_endian) {
        (true, 32, _, false) => "F32LE",
        (true, 32, _, true) => "F32BE",
        (false, 16, true, false) => "S16LE",
        (false, 16, true, true) => "S16BE",
        (false, 16, false, false) => "U16LE",
        (false, 16, false, true) => "U16BE",
        (false, 8, true, _) => "S8",
        (false, 8, false, _) => "U8",
        _ => "S16LE",
    };
    gstreamer::Caps::builder("audio/x-raw")
        .field("format", format)
        .field("rate", pcm.rate as i32)
        .field("channels", pcm.channels as i32)
        .field("layout", "interleaved")
        .build()
}

/// Builds the appsrc→audioconvert→audioresample→volume→sink graph,
/// returning the populated context.
pub fn build_pipeline(pcm: &WebAudioPcmConfig, capacity_bytes: u32) -> Result<WebAudioContext, PlayerError> {
    let pipeline = gstreamer::Pipeline::new();

    let app_src = gstreamer::ElementFactory::make("appsrc")
        .property("format", gstreamer::Format::Time)
        .property("is-live", false)
        .property("max-bytes", capacity_bytes as u64)
        .property("caps", caps_for_pcm(pcm))
        .build()
        .map_err(|_| PlayerError::FrameworkFailure("failed to create appsrc".into()))?;

    let convert = gstreamer::ElementFactory::make("audioconvert")
        .build()
        .map_err(|_| PlayerError::FrameworkFailure("failed to create audioconvert".into()))?;
    let resample = gstreamer::ElementFactory::make("audioresample")
        .build()
        .map_err(|_| PlayerError::FrameworkFailure("failed to create audioresample".into()))?;
    let volume = gstreamer::ElementFactory::make("volume")
        .build()
        .map_err(|_| PlayerError::FrameworkFailure("failed to create volume".into()))?;

    let sink = AUDIO_SINK_CANDIDATES
        .iter()
        .find_map(|name| gstreamer::ElementFactory::make(name).build().ok())
        .ok_or_else(|| PlayerError::FrameworkFailure("no audio sink factory available".into()))?;

    pipeline
        .dynamic_cast_ref::<gstreamer::Bin>()
        .expect("Pipeline is a Bin")
        .add_many([&app_src, &convert, &resample, &volume, &sink])
        .map_err(|_| PlayerError::FrameworkFailure("failed to add elements to web-audio pipeline".into()))?;
    gstreamer::Element::link_many([&app_src, &convert, &resample, &volume, &sink])
        .map_err(|_| PlayerError::FrameworkFailure("failed to link web-audio pipeline".into()))?;

    let bytes_per_sample = (pcm.sample_size / 8).max(1) * pcm.channels.max(1);

    Ok(WebAudioContext {
        pipeline: Some(pipeline.upcast()),
        app_src: Some(app_src),
        volume_element: Some(volume),
        bytes_per_sample,
        pcm_rate: pcm.rate,
        capacity_bytes,
    })
}

/// Caller-thread read: computed directly from the appsrc's queued
/// level, never enqueued onto the Worker.
pub fn get_buffer_available(ctx: &WebAudioContext) -> Result<WebAudioBufferAvailable, PlayerError> {
    let app_src = ctx
        .app_src
        .as_ref()
        .ok_or_else(|| PlayerError::Misuse("web-audio appsrc not yet constructed".into()))?;
    let bytes_per_sample = ctx.bytes_per_sample.max(1) as u64;
    let current_level = app_src.property::<u64>("current-level-bytes");
    let mut available = (ctx.capacity_bytes as u64).saturating_sub(current_level);
    available -= available % bytes_per_sample;

    Ok(WebAudioBufferAvailable {
        offset_main: WEBAUDIO_PARTITION_HEADER_BYTES,
        length_main: available as u32,
        offset_wrap: 0,
        length_wrap: 0,
        available_frames: (available / bytes_per_sample) as u32,
    })
}

/// Caller-thread read: queued bytes expressed as a playout delay.
pub fn get_buffer_delay(ctx: &WebAudioContext) -> Result<Duration, PlayerError> {
    let app_src = ctx
        .app_src
        .as_ref()
        .ok_or_else(|| PlayerError::Misuse("web-audio appsrc not yet constructed".into()))?;
    let bytes_per_sample = ctx.bytes_per_sample.max(1) as u64;
    let current_level = app_src.property::<u64>("current-level-bytes");
    let frames = current_level / bytes_per_sample;
    let rate = ctx.pcm_rate.max(1) as u64;
    Ok(Duration::from_secs_f64(frames as f64 / rate as f64))
}

/// Caller-thread read: derived wholly from construction-time constants.
/// `support_deferred_play` is always true since no platform capability
/// query is named for device limits.
pub fn get_device_info(ctx: &WebAudioContext) -> WebAudioDeviceInfo {
    let bytes_per_sample = ctx.bytes_per_sample.max(1);
    WebAudioDeviceInfo {
        maximum_frames: ctx.capacity_bytes / bytes_per_sample,
        preferred_frames: (ctx.capacity_bytes / bytes_per_sample) / 2,
        support_deferred_play: true,
    }
}

/// Caller-thread read of the current volume.
pub fn get_volume(ctx: &WebAudioContext) -> Result<f64, PlayerError> {
    let element = ctx
        .volume_element
        .as_ref()
        .ok_or_else(|| PlayerError::Misuse("web-audio pipeline not yet constructed".into()))?;
    Ok(element.property::<f64>("volume"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_map_16bit_signed_little_endian() {
        let pcm = WebAudioPcmConfig {
            rate: 41000,
            channels: 2,
            sample_size: 16,
            is_big_endian: false,
            is_signed: true,
            is_float: false,
        };
        gstreamer::init().ok();
        let caps = caps_for_pcm(&pcm);
        let structure = caps.structure(0).unwrap();
        assert_eq!(structure.get::<String>("format").unwrap(), "S16LE");
        assert_eq!(structure.get::<i32>("rate").unwrap(), 41000);
        assert_eq!(structure.get::<i32>("channels").unwrap(), 2);
    }

    #[test]
    fn rendezvous_delivers_published_value() {
        let rendezvous = WriteRendezvous::new();
        let r2 = rendezvous.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            r2.publish(128);
        });
        assert_eq!(rendezvous.wait(Duration::from_secs(1)), Some(128));
    }

    #[test]
    fn rendezvous_times_out_when_nothing_is_published() {
        let rendezvous = WriteRendezvous::new();
        assert_eq!(rendezvous.wait(Duration::from_millis(20)), None);
    }

    #[test]
    fn device_info_derives_from_capacity_and_sample_size() {
        let ctx = WebAudioContext::new(4, 41000, 10 * 1024);
        let info = get_device_info(&ctx);
        assert_eq!(info.maximum_frames, 10 * 1024 / 4);
        assert_eq!(info.preferred_frames, info.maximum_frames / 2);
        assert!(info.support_deferred_play);
    }
}
