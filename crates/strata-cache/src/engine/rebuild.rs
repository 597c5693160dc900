//! Background rebuild worker.
//!
//! At most one worker thread runs per [`Rebuilder`]. The job's lifecycle is an
//! explicit state machine guarded by a mutex and condvar:
//!
//! ```text
//! Idle/Finished --start--> Running --finish--> Finished
//!                             |
//!                          cancel
//!                             v
//!                         Cancelling --worker exits--> Idle
//! ```
//!
//! Cancellation is cooperative: the job polls the cancel flag at block
//! boundaries. Committing the result and observing the flag happen under the
//! state lock, so once `cancel` has seen `Running` no FINISHED event can fire.
//!
//! Every start bumps a generation. A job only ever moves the state machine
//! while its generation is current, so a worker that is still unwinding
//! after a listener restarted the rebuild cannot touch its successor's state.

use super::events::{AsyncListener, ListenerId, ListenerRegistry};
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

thread_local! {
    /// Address of the `Shared` whose worker this thread is, or 0.
    static WORKER_OF: Cell<usize> = const { Cell::new(0) };
}

/// Rebuild job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebuildState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Finished,
}

impl RebuildState {
    /// A worker thread is alive.
    pub fn is_busy(self) -> bool {
        matches!(self, RebuildState::Running | RebuildState::Cancelling)
    }
}

/// Result of [`Rebuilder::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStart {
    Started,
    /// A rebuild is already running; nothing was started.
    Busy,
}

#[derive(Debug, Default)]
struct Job {
    state: RebuildState,
    generation: u64,
}

struct Shared {
    job: Mutex<Job>,
    changed: Condvar,
    cancel: AtomicBool,
    listeners: ListenerRegistry,
    last_error: Mutex<Option<String>>,
    progress_interval: u64,
}

impl Shared {
    fn request_cancel(&self) -> bool {
        let mut job = self.job.lock();
        match job.state {
            RebuildState::Running => {
                job.state = RebuildState::Cancelling;
                self.cancel.store(true, Ordering::Release);
                tracing::info!("Cancelling background rebuild");
                true
            }
            RebuildState::Cancelling => true,
            RebuildState::Idle | RebuildState::Finished => false,
        }
    }

    fn wait_until_idle(&self, deadline: Option<Instant>) -> bool {
        let mut job = self.job.lock();
        while job.state.is_busy() {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut job, deadline).timed_out() {
                        return !job.state.is_busy();
                    }
                }
                None => self.changed.wait(&mut job),
            }
        }
        true
    }

    fn is_current_worker(self: &Arc<Self>) -> bool {
        let me = Arc::as_ptr(self) as usize;
        WORKER_OF.with(|w| w.get() == me)
    }
}

/// Handle the job uses to report progress and publish its result.
pub struct RebuildContext {
    shared: Arc<Shared>,
    generation: u64,
    total: u64,
    reported: u64,
    final_sent: bool,
}

impl RebuildContext {
    fn new(shared: Arc<Shared>, generation: u64, total: u64) -> Self {
        Self {
            shared,
            generation,
            total,
            reported: 0,
            final_sent: false,
        }
    }

    /// Cooperative cancel flag, to be polled at block boundaries.
    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.shared.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Report frames processed so far.
    ///
    /// Events are throttled to one per progress interval, never go backwards,
    /// and the final count is always delivered.
    pub fn report_progress(&mut self, frames_done: u64) {
        let done = frames_done.min(self.total);
        if done < self.reported {
            return;
        }
        if done == self.total {
            if self.final_sent {
                return;
            }
            self.final_sent = true;
        } else if done - self.reported < self.shared.progress_interval {
            return;
        }
        self.reported = done;
        self.shared.listeners.progress(done, self.total);
    }

    /// Run `commit` and fire FINISHED, unless the job was cancelled.
    ///
    /// Returns `false` (without running `commit`) if cancellation won.
    pub fn finish(&mut self, commit: impl FnOnce()) -> bool {
        let listeners = {
            let mut job = self.shared.job.lock();
            if job.generation != self.generation
                || job.state != RebuildState::Running
                || self.is_cancelled()
            {
                return false;
            }
            commit();
            job.state = RebuildState::Finished;
            self.shared.changed.notify_all();
            self.shared.listeners.snapshot()
        };

        tracing::info!("Background rebuild finished ({} frames)", self.total);
        for listener in listeners {
            listener.on_finished();
        }
        true
    }

    fn record_error(&self, message: String) {
        let job = self.shared.job.lock();
        if job.generation == self.generation {
            *self.shared.last_error.lock() = Some(message);
        }
    }
}

impl Drop for RebuildContext {
    fn drop(&mut self) {
        let mut job = self.shared.job.lock();
        if job.generation == self.generation && job.state.is_busy() {
            job.state = RebuildState::Idle;
            self.shared.changed.notify_all();
        }
    }
}

/// Cheap handle that can request cancellation without waiting.
#[derive(Clone)]
pub struct RebuildCanceller {
    shared: Arc<Shared>,
}

impl RebuildCanceller {
    /// Returns `true` if a rebuild was running.
    pub fn request_cancel(&self) -> bool {
        self.shared.request_cancel()
    }
}

/// Owner of the background rebuild worker.
pub struct Rebuilder {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Rebuilder {
    pub fn new(progress_interval: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                job: Mutex::new(Job::default()),
                changed: Condvar::new(),
                cancel: AtomicBool::new(false),
                listeners: ListenerRegistry::default(),
                last_error: Mutex::new(None),
                progress_interval,
            }),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the worker running `job`, unless one is already running.
    ///
    /// `total` is the frame count progress is reported against. A job error is
    /// logged and kept for [`Rebuilder::last_error`]; it fires no event.
    pub fn start<F>(&self, total: u64, job: F) -> Result<RebuildStart>
    where
        F: FnOnce(&mut RebuildContext) -> Result<()> + Send + 'static,
    {
        let generation = {
            let mut state = self.shared.job.lock();
            if state.state.is_busy() {
                return Ok(RebuildStart::Busy);
            }
            state.generation += 1;
            state.state = RebuildState::Running;
            self.shared.cancel.store(false, Ordering::Release);
            *self.shared.last_error.lock() = None;
            state.generation
        };

        // The previous worker has published its result and may still be
        // inside a listener; reap it with no lock held.
        let previous = self.handle.lock().take();
        if let Some(previous) = previous {
            join_worker(previous);
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("strata-rebuild".into())
            .spawn(move || {
                WORKER_OF.with(|w| w.set(Arc::as_ptr(&shared) as usize));
                let mut ctx = RebuildContext::new(shared, generation, total);
                if let Err(e) = job(&mut ctx) {
                    tracing::error!("Background rebuild failed: {}", e);
                    ctx.record_error(e.to_string());
                }
            });

        match spawned {
            Ok(worker) => {
                // A listener may already have restarted and parked a newer
                // worker here; that one is the handle to keep.
                let mut handle = self.handle.lock();
                if handle.is_none() {
                    *handle = Some(worker);
                }
                drop(handle);
                tracing::info!("Started background rebuild of {} frames", total);
                Ok(RebuildStart::Started)
            }
            Err(e) => {
                let mut state = self.shared.job.lock();
                if state.generation == generation {
                    state.state = RebuildState::Idle;
                    self.shared.changed.notify_all();
                }
                Err(Error::Rebuild(format!("failed to spawn rebuild thread: {e}")))
            }
        }
    }

    /// Cancel a running rebuild and block until its worker has exited.
    ///
    /// No-op when idle. Called from a worker thread (e.g. inside a
    /// listener) it only raises the flag.
    pub fn cancel(&self) {
        self.shared.request_cancel();
        if self.on_worker_thread() {
            return;
        }
        self.wait();
    }

    /// Like [`Rebuilder::cancel`], but gives up after `timeout`.
    ///
    /// Returns `true` if the worker has stopped.
    pub fn cancel_timeout(&self, timeout: Duration) -> bool {
        self.shared.request_cancel();
        if self.on_worker_thread() {
            return false;
        }
        if !self.shared.wait_until_idle(Some(Instant::now() + timeout)) {
            return false;
        }
        self.join();
        true
    }

    /// Non-blocking cancellation handle.
    pub fn canceller(&self) -> RebuildCanceller {
        RebuildCanceller {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Block until the current worker (if any) has exited.
    pub fn wait(&self) {
        if self.on_worker_thread() {
            return;
        }
        self.shared.wait_until_idle(None);
        self.join();
    }

    pub fn state(&self) -> RebuildState {
        self.shared.job.lock().state
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// Error from the most recent rebuild, cleared when a new one starts.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Register a listener. If no rebuild is running it immediately receives
    /// `on_finished`, and stays registered for later rebuilds.
    pub fn add_listener(&self, listener: Arc<dyn AsyncListener>) -> ListenerId {
        let (id, busy) = {
            let job = self.shared.job.lock();
            (self.shared.listeners.add(Arc::clone(&listener)), job.state.is_busy())
        };
        if !busy {
            listener.on_finished();
        }
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Any worker this rebuilder ever spawned, including one still unwinding
    /// after a restart.
    fn on_worker_thread(&self) -> bool {
        self.shared.is_current_worker()
    }

    fn join(&self) {
        let worker = self.handle.lock().take();
        if let Some(worker) = worker {
            join_worker(worker);
        }
    }
}

impl Drop for Rebuilder {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.thread().id() == thread::current().id() {
        // Restarted from inside the worker's own callback; let it detach.
        return;
    }
    if worker.join().is_err() {
        tracing::error!("Rebuild worker panicked");
    }
}
