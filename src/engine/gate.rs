// Fri Oct 16 2026 - Alex

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Binary open/closed signal. Threads calling [`wait`](Self::wait) pass
/// straight through an open gate and block on a closed one until
/// [`open`](Self::open) is called.
pub struct SuspendGate {
    open: Mutex<bool>,
    signal: Condvar,
}

impl SuspendGate {
    pub fn new(open: bool) -> Self {
        Self {
            open: Mutex::new(open),
            signal: Condvar::new(),
        }
    }

    pub fn opened() -> Self {
        Self::new(true)
    }

    pub fn closed() -> Self {
        Self::new(false)
    }

    pub fn open(&self) {
        let mut open = self.open.lock();
        if !*open {
            *open = true;
            self.signal.notify_all();
        }
    }

    pub fn close(&self) {
        *self.open.lock() = false;
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.signal.wait(&mut open);
        }
    }

    /// Waits at most `timeout` and returns whether the gate ended up open.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut open = self.open.lock();

        while !*open {
            if self.signal.wait_until(&mut open, deadline).timed_out() {
                break;
            }
        }

        *open
    }
}

impl Default for SuspendGate {
    fn default() -> Self {
        Self::opened()
    }
}
