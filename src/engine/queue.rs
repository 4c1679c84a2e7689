// Fri Oct 16 2026 - Alex

use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO job container shared between producers and one background thread.
///
/// Dequeue never blocks; waiting for work is done by the owner through a
/// [`SuspendGate`](crate::engine::gate::SuspendGate).
pub struct JobQueue<T> {
    jobs: Mutex<VecDeque<T>>,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, job: T) {
        self.jobs.lock().push_back(job);
    }

    pub fn try_dequeue(&self) -> Option<T> {
        self.jobs.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Drops every queued job and returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs.lock();
        let count = jobs.len();
        jobs.clear();
        count
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
