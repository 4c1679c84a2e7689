// Fri Oct 16 2026 - Alex

use crate::engine::gate::SuspendGate;
use crate::engine::queue::JobQueue;
use crate::engine::state::{ExecutionState, StopCause};
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Work performed for every dequeued job, on the unit's background thread.
pub trait JobHandler<T>: Send + Sync + 'static {
    fn run_job(&self, job: &T);
}

impl<T, F> JobHandler<T> for F
where
    F: Fn(&T) + Send + Sync + 'static,
{
    fn run_job(&self, job: &T) {
        self(job)
    }
}

pub type StopListener = Arc<dyn Fn(&StopCause) + Send + Sync>;

pub(crate) type ForwardHook<T> = Box<dyn Fn(T) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdleStrategy {
    /// Sleep for the poll interval whenever the queue is empty.
    Poll,
    /// Park on the pending gate until a job arrives.
    Block,
}

pub(crate) struct ExecutorOptions {
    pub name: String,
    pub thread_name: String,
    pub idle: IdleStrategy,
    pub poll_interval: Duration,
    pub listeners: Vec<StopListener>,
}

/// Shared core of [`Worker`](crate::engine::Worker) and
/// [`Stage`](crate::engine::Stage): a queue, its gates and one background
/// thread that drains the queue through a handler.
pub(crate) struct Executor<T> {
    name: String,
    thread_name: String,
    idle: IdleStrategy,
    poll_interval_nanos: AtomicU64,
    handler: Box<dyn JobHandler<T>>,
    forward: Option<ForwardHook<T>>,
    queue: JobQueue<T>,
    pending: SuspendGate,
    resume: SuspendGate,
    shutdown: SuspendGate,
    state: Mutex<ExecutionState>,
    stop_requested: AtomicBool,
    listeners: Mutex<Vec<StopListener>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Executor<T> {
    pub fn new(
        options: ExecutorOptions,
        handler: Box<dyn JobHandler<T>>,
        forward: Option<ForwardHook<T>>,
    ) -> Self {
        Self {
            name: options.name,
            thread_name: options.thread_name,
            idle: options.idle,
            poll_interval_nanos: AtomicU64::new(duration_to_nanos(options.poll_interval)),
            handler,
            forward,
            queue: JobQueue::new(),
            pending: SuspendGate::closed(),
            resume: SuspendGate::opened(),
            shutdown: SuspendGate::closed(),
            state: Mutex::new(ExecutionState::Stopped),
            stop_requested: AtomicBool::new(false),
            listeners: Mutex::new(options.listeners),
            thread: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ExecutionState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.is_running() && !self.resume.is_open()
    }

    pub fn job_count(&self) -> usize {
        self.queue.len()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_nanos(self.poll_interval_nanos.load(Ordering::Relaxed))
    }

    pub fn set_poll_interval(&self, interval: Duration) {
        self.poll_interval_nanos
            .store(duration_to_nanos(interval), Ordering::Relaxed);
    }

    pub fn add_stop_listener(&self, listener: StopListener) {
        self.listeners.lock().push(listener);
    }

    /// Launches the background thread. Returns `false` when the unit is
    /// already active or has been disposed.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut state = self.state.lock();
        if *state != ExecutionState::Stopped {
            trace!("'{}' start ignored while {}", self.name, *state);
            return false;
        }

        *state = ExecutionState::Starting;

        // Changing the running flag always empties the queue.
        self.discard_jobs();
        self.resume.open();
        self.shutdown.close();
        self.stop_requested.store(false, Ordering::SeqCst);

        let core = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || core.run());

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                debug!("'{}' started", self.name);
                true
            }
            Err(e) => {
                error!("'{}' failed to spawn background thread: {}", self.name, e);
                *state = ExecutionState::Stopped;
                false
            }
        }
    }

    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_running() {
            return false;
        }

        *state = ExecutionState::Stopping;
        self.request_exit();
        debug!("'{}' stop requested", self.name);
        true
    }

    pub fn dispose(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_disposed() {
            return false;
        }

        *state = ExecutionState::Disposed;
        self.request_exit();
        self.discard_jobs();
        debug!("'{}' disposed", self.name);
        true
    }

    pub fn pause(&self) {
        let state = self.state.lock();
        if state.is_running() {
            self.resume.close();
            debug!("'{}' paused", self.name);
        }
    }

    pub fn resume(&self) {
        let state = self.state.lock();
        if state.is_running() {
            self.resume.open();
            debug!("'{}' resumed", self.name);
        }
    }

    pub fn add(&self, job: T) -> bool {
        let state = self.state.lock();
        if !state.is_running() {
            trace!("'{}' dropped job while {}", self.name, *state);
            return false;
        }

        self.queue.enqueue(job);
        self.pending.open();
        true
    }

    pub fn clear_jobs(&self) -> usize {
        let discarded = self.discard_jobs();
        if discarded > 0 {
            trace!("'{}' cleared {} queued job(s)", self.name, discarded);
        }
        discarded
    }

    /// Blocks until the most recently started background thread has exited.
    /// Returns immediately when called from that thread.
    pub fn join(&self) {
        let handle = self.thread.lock().take();

        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            let _ = handle.join();
        }
    }

    fn request_exit(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.shutdown.open();
        self.pending.open();
        self.resume.open();
    }

    fn exit_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn discard_jobs(&self) -> usize {
        let discarded = self.queue.clear();
        self.settle_pending();
        discarded
    }

    /// Dequeues the next job unless the executor is paused. The state lock is
    /// held across the resume check and the dequeue, so once `pause` returns
    /// no further job leaves the queue.
    fn take_job(&self) -> Option<T> {
        let _state = self.state.lock();
        if !self.resume.is_open() {
            return None;
        }

        let job = self.queue.try_dequeue();
        if self.queue.is_empty() {
            self.settle_pending();
        }
        job
    }

    /// Closes the pending gate when the queue is empty. A producer that opens
    /// the gate after racing a dequeue leaves it open over an empty queue, so
    /// the gate is closed again here and reopened only if a job slipped in.
    fn settle_pending(&self) {
        self.pending.close();
        if !self.queue.is_empty() {
            self.pending.open();
        }
    }

    fn run(self: Arc<Self>) {
        {
            let mut state = self.state.lock();
            if *state == ExecutionState::Starting {
                *state = ExecutionState::Running;
            }
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.work_loop()));

        let cause = match outcome {
            Ok(()) => StopCause::Requested,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("'{}' job handler panicked: {}", self.name, message);
                StopCause::JobPanicked { message }
            }
        };

        let disposed = {
            let mut state = self.state.lock();
            if !state.is_disposed() {
                *state = ExecutionState::Stopped;
            }
            self.discard_jobs();
            state.is_disposed()
        };

        if disposed {
            debug!("'{}' background thread exited during disposal", self.name);
            return;
        }

        debug!("'{}' stopped ({})", self.name, cause);

        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(&cause);
        }
    }

    fn work_loop(&self) {
        loop {
            if self.idle == IdleStrategy::Block {
                self.pending.wait();
            }

            self.resume.wait();

            if self.exit_requested() {
                break;
            }

            match self.take_job() {
                Some(job) => self.execute(job),
                None => {
                    if self.idle == IdleStrategy::Poll {
                        self.shutdown.wait_timeout(self.poll_interval());
                    }
                }
            }
        }
    }

    fn execute(&self, job: T) {
        self.handler.run_job(&job);

        if let Some(forward) = &self.forward {
            if self.is_running() {
                forward(job);
            }
        }
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
