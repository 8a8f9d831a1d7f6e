//! Position/Underflow Timer and NeedData resend timer. Both are plain
//! `std::thread` loops that only ever enqueue a task onto a
//! `WorkerHandle` — neither touches `GenericPlayerContext` directly,
//! preserving the single-mutator property.

use crate::client::PlayerClient;
use crate::worker::WorkerHandle;
use rialto_common::MediaSourceType;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Recurring 250 ms position-report / audio-underflow-watchdog tick.
/// `PositionTick::execute` is itself idempotent and a no-op while not
/// PLAYING, so this timer runs for the session's whole lifetime rather
/// than being started/stopped around Play/Pause.
pub struct PositionTimer {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl PositionTimer {
    pub fn spawn(worker: WorkerHandle, client: Arc<dyn PlayerClient>, period: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();
        let join = std::thread::Builder::new()
            .name("rialto-position-timer".into())
            .spawn(move || {
                while running_thread.load(Ordering::SeqCst) {
                    std::thread::sleep(period);
                    if !running_thread.load(Ordering::SeqCst) {
                        break;
                    }
                    worker.enqueue(Box::new(crate::tasks::generic::PositionTick {
                        client: client.clone(),
                    }));
                }
            })
            .expect("failed to spawn rialto-position-timer thread");
        PositionTimer {
            running,
            join: Some(join),
        }
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for PositionTimer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// One-shot NeedData resend timer. Fires once after `delay`, enqueuing
/// a fresh `NeedData` for `source_type`. Cancellation is cooperative:
/// `ResendTimers::clear` (done by `NeedData::execute` itself, or by
/// Stop/RemoveSource/DestroySession) just lets a later `HaveData` arm a
/// new timer — an in-flight timer that still fires is harmless because
/// `NeedData::execute` re-derives everything from current context
/// state and is itself idempotent.
pub fn spawn_resend_timer(
    worker: WorkerHandle,
    client: Arc<dyn PlayerClient>,
    source_type: MediaSourceType,
    delay: Duration,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("rialto-resend-timer".into())
        .spawn(move || {
            std::thread::sleep(delay);
            worker.enqueue(Box::new(crate::tasks::generic::NeedData { source_type, client }));
        })
        .expect("failed to spawn rialto-resend-timer thread")
}
