// Fri Oct 16 2026 - Alex

use crate::config::EngineConfig;
use crate::engine::executor::{
    Executor, ExecutorOptions, IdleStrategy, JobHandler, StopListener, DEFAULT_POLL_INTERVAL,
};
use crate::engine::state::{ExecutionState, StopCause};
use std::sync::Arc;
use std::time::Duration;

/// Standalone job processor with a single background thread.
///
/// Jobs passed to [`add`](Self::add) are handed to the handler one by one,
/// in FIFO order. When the queue is empty the thread sleeps for the poll
/// interval before looking again. Jobs added while the worker is not running
/// are dropped.
///
/// ```no_run
/// use jobline::engine::Worker;
///
/// let worker: Worker<u32> = Worker::new(|job: &u32| println!("job {}", job));
/// worker.start();
/// worker.add(1);
/// worker.stop();
/// worker.join();
/// ```
pub struct Worker<T: Send + 'static> {
    core: Arc<Executor<T>>,
}

impl<T: Send + 'static> Worker<T> {
    pub fn new<H: JobHandler<T>>(handler: H) -> Self {
        WorkerBuilder::new().build(handler)
    }

    pub fn from_config<H: JobHandler<T>>(config: &EngineConfig, name: &str, handler: H) -> Self {
        WorkerBuilder::new()
            .name(name)
            .thread_name_prefix(&config.thread_name_prefix)
            .poll_interval(config.poll_interval())
            .build(handler)
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Returns `true` if a new background thread was launched.
    pub fn start(&self) -> bool {
        self.core.start()
    }

    /// Requests the background loop to exit. Queued jobs are discarded once
    /// it does; a job already inside the handler runs to completion.
    pub fn stop(&self) -> bool {
        self.core.stop()
    }

    pub fn pause(&self) {
        self.core.pause();
    }

    pub fn resume(&self) {
        self.core.resume();
    }

    /// Returns `false` if the job was dropped because the worker is not running.
    pub fn add(&self, job: T) -> bool {
        self.core.add(job)
    }

    /// Stops the worker for good. Later calls to [`start`](Self::start) do nothing.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn join(&self) {
        self.core.join();
    }

    pub fn on_stopped<F>(&self, listener: F)
    where
        F: Fn(&StopCause) + Send + Sync + 'static,
    {
        self.core.add_stop_listener(Arc::new(listener));
    }

    pub fn state(&self) -> ExecutionState {
        self.core.state()
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.core.is_paused()
    }

    pub fn job_count(&self) -> usize {
        self.core.job_count()
    }

    pub fn poll_interval(&self) -> Duration {
        self.core.poll_interval()
    }

    pub fn set_poll_interval(&self, interval: Duration) {
        self.core.set_poll_interval(interval);
    }
}

impl<T: Send + 'static> Drop for Worker<T> {
    fn drop(&mut self) {
        self.core.dispose();
        self.core.join();
    }
}

pub struct WorkerBuilder {
    name: String,
    thread_name_prefix: String,
    poll_interval: Duration,
    listeners: Vec<StopListener>,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self {
            name: "worker".to_string(),
            thread_name_prefix: crate::config::DEFAULT_THREAD_PREFIX.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            listeners: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn thread_name_prefix(mut self, prefix: &str) -> Self {
        self.thread_name_prefix = prefix.to_string();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn on_stopped<F>(mut self, listener: F) -> Self
    where
        F: Fn(&StopCause) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn build<T, H>(self, handler: H) -> Worker<T>
    where
        T: Send + 'static,
        H: JobHandler<T>,
    {
        let options = ExecutorOptions {
            thread_name: format!("{}-{}", self.thread_name_prefix, self.name),
            name: self.name,
            idle: IdleStrategy::Poll,
            poll_interval: self.poll_interval,
            listeners: self.listeners,
        };

        Worker {
            core: Arc::new(Executor::new(options, Box::new(handler), None)),
        }
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
