//! Bus dispatcher thread, grounded on
//! `kaleidux-daemon::video::VideoPlayer::start`'s bus-watcher loop: a
//! dedicated `std::thread` draining `Bus::timed_pop` at a short poll
//! interval. This dispatcher never touches player state itself — it
//! only forwards each message into whatever closure the owner supplied,
//! which is expected to enqueue a task onto the relevant Worker rather
//! than handle the message inline on the bus thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

const POLL_INTERVAL_MS: u64 = 100;

pub struct BusDispatcher {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl BusDispatcher {
    /// Spawns the dispatcher thread. `on_message` is called with every
    /// message popped off `pipeline`'s bus; it must not block for long,
    /// since it holds up delivery of subsequent messages.
    pub fn spawn(
        pipeline: gstreamer::Element,
        mut on_message: impl FnMut(gstreamer::Message) + Send + 'static,
    ) -> Option<Self> {
        use gstreamer::prelude::*;
        let bus = pipeline.bus()?;
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();

        let join = std::thread::Builder::new()
            .name("rialto-bus-dispatcher".into())
            .spawn(move || {
                while running_thread.load(Ordering::SeqCst) {
                    if let Some(message) =
                        bus.timed_pop(gstreamer::ClockTime::from_mseconds(POLL_INTERVAL_MS))
                    {
                        on_message(message);
                    }
                }
            })
            .expect("failed to spawn rialto-bus-dispatcher thread");

        Some(BusDispatcher {
            running,
            join: Some(join),
        })
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for BusDispatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
