//! Single-threaded FIFO task executor. Modelled as a dedicated OS
//! thread draining an `mpsc` channel rather than a tokio
//! task: GStreamer state-change calls must run to completion without
//! being pre-empted by the async runtime, the same reason
//! `kaleidux-daemon::video::VideoPlayer::start` spawns a plain
//! `std::thread` for its bus-watcher loop instead of using `tokio::spawn`.

use crate::context::GenericPlayerContext;
use crate::error::PlayerError;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

/// A unit of work executed with exclusive access to the player context.
/// Task structs hold only the references they need (client callback,
/// wrapper handles) rather than an owning back-reference to the player,
/// breaking the Player/Worker/TaskFactory ownership cycle that a naive
/// translation would otherwise create.
pub trait PlayerTask: Send {
    fn execute(&mut self, ctx: &mut GenericPlayerContext) -> Result<(), PlayerError>;

    /// Human-readable name for logging; defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

enum Job {
    Task(Box<dyn PlayerTask>),
    Ping(Box<dyn FnOnce() + Send>),
    Shutdown,
}

/// Handle to a running Worker. Cloning is cheap (it's just a channel
/// sender); the thread itself is joined once, by whichever owner calls
/// `stop`.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: Sender<Job>,
}

pub struct Worker {
    handle: WorkerHandle,
    join: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns the worker thread, which owns `ctx` for its entire
    /// lifetime. Tasks that fail are logged; only terminal errors
    /// (`PlayerError::is_terminal`) are surfaced via `on_terminal_error`.
    pub fn spawn(
        mut ctx: GenericPlayerContext,
        mut on_terminal_error: impl FnMut(&mut GenericPlayerContext, PlayerError) + Send + 'static,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let join = std::thread::Builder::new()
            .name("rialto-worker".into())
            .spawn(move || {
                for job in receiver {
                    match job {
                        Job::Task(mut task) => {
                            let name = task.name();
                            if let Err(err) = task.execute(&mut ctx) {
                                tracing::warn!(task = name, error = %err, "task failed");
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
            .expect("failed to spawn rialto-worker thread");

        Worker {
            handle: WorkerHandle { sender },
            join: Some(join),
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Drains tasks enqueued before this call, then joins the thread.
    /// A `Shutdown` sentinel breaks the worker's receive loop once it's
    /// dequeued in FIFO order; tasks enqueued afterward (whether via
    /// this handle or a clone held elsewhere) are never dequeued and
    /// are dropped when the channel itself is dropped.
    pub fn stop(mut self) {
        let _ = self.handle.sender.send(Job::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl WorkerHandle {
    /// O(1), FIFO, never blocks the producer.
    pub fn enqueue(&self, task: Box<dyn PlayerTask>) {
        // A closed channel means the worker already stopped; enqueuing
        // after stop is defined to silently drop the task.
        let _ = self.sender.send(Job::Task(task));
    }

    /// Enqueues a heartbeat that runs only after every task enqueued
    /// before it has executed.
    pub fn ping(&self, handler: impl FnOnce() + Send + 'static) {
        let _ = self.sender.send(Job::Ping(Box::new(handler)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenericPlayerContext;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Increment(Arc<AtomicU32>);
    impl PlayerTask for Increment {
        fn execute(&mut self, _ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;
    impl PlayerTask for Failing {
        fn execute(&mut self, _ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
            Err(PlayerError::TransientDemand)
        }
    }

    #[test]
    fn tasks_execute_in_fifo_order() {
        let counter = Arc::new(AtomicU32::new(0));
        let worker = Worker::spawn(GenericPlayerContext::new(false), |_, _| {});
        let handle = worker.handle();
        for _ in 0..10 {
            handle.enqueue(Box::new(Increment(counter.clone())));
        }
        let (tx, rx) = mpsc::channel();
        handle.ping(move || {
            let _ = tx.send(());
        });
        rx.recv().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        worker.stop();
    }

    #[test]
    fn non_terminal_failure_does_not_stop_worker() {
        let counter = Arc::new(AtomicU32::new(0));
        let worker = Worker::spawn(GenericPlayerContext::new(false), |_, _| {});
        let handle = worker.handle();
        handle.enqueue(Box::new(Failing));
        handle.enqueue(Box::new(Increment(counter.clone())));
        let (tx, rx) = mpsc::channel();
        handle.ping(move || {
            let _ = tx.send(());
        });
        rx.recv().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        worker.stop();
    }

    #[test]
    fn terminal_failure_invokes_callback() {
        let saw_terminal = Arc::new(AtomicU32::new(0));
        let saw_terminal_clone = saw_terminal.clone();
        struct Terminal;
        impl PlayerTask for Terminal {
            fn execute(&mut self, _ctx: &mut GenericPlayerContext) -> Result<(), PlayerError> {
                Err(PlayerError::FrameworkFailure("boom".into()))
            }
        }
        let worker = Worker::spawn(GenericPlayerContext::new(false), move |_, err| {
            assert!(err.is_terminal());
            saw_terminal_clone.fetch_add(1, Ordering::SeqCst);
        });
        let handle = worker.handle();
        handle.enqueue(Box::new(Terminal));
        let (tx, rx) = mpsc::channel();
        handle.ping(move || {
            let _ = tx.send(());
        });
        rx.recv().unwrap();
        assert_eq!(saw_terminal.load(Ordering::SeqCst), 1);
        worker.stop();
    }
}
