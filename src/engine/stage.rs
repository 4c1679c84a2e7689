// Fri Oct 16 2026 - Alex

use crate::engine::error::TopologyError;
use crate::engine::executor::{
    Executor, ExecutorOptions, ForwardHook, IdleStrategy, JobHandler, StopListener,
    DEFAULT_POLL_INTERVAL,
};
use crate::engine::state::{ExecutionState, StopCause};
use crate::engine::topology::{LinkAction, Registry, StageId, Topology};
use std::sync::Arc;

/// Chainable pipeline block.
///
/// Runs like a [`Worker`](crate::engine::Worker) but parks its thread while
/// the queue is empty, and passes every finished job on to its successor.
/// Every start and every stop empties the queue, so jobs never survive a
/// restart.
pub struct Stage<T: Send + 'static> {
    id: StageId,
    core: Arc<Executor<T>>,
    registry: Arc<Registry<T>>,
}

impl<T: Send + 'static> Stage<T> {
    /// Links `previous -> next`, detaching whatever either side was linked to
    /// before, then starts the stages selected by `start`.
    pub fn connect(
        previous: &Stage<T>,
        next: &Stage<T>,
        start: LinkAction,
    ) -> Result<(), TopologyError> {
        if !Arc::ptr_eq(&previous.registry, &next.registry) {
            return Err(TopologyError::ForeignStage);
        }
        previous.registry.connect(previous.id, next.id, start)
    }

    /// Removes the `previous -> next` link, then stops the stages selected by
    /// `stop`. Fails without touching anything if the two are not linked
    /// exactly that way.
    pub fn disconnect(
        previous: &Stage<T>,
        next: &Stage<T>,
        stop: LinkAction,
    ) -> Result<(), TopologyError> {
        if !Arc::ptr_eq(&previous.registry, &next.registry) {
            return Err(TopologyError::ForeignStage);
        }
        previous.registry.disconnect(previous.id, next.id, stop)
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn start(&self) -> bool {
        self.core.start()
    }

    pub fn stop(&self) -> bool {
        self.core.stop()
    }

    pub fn suspend(&self) {
        self.core.pause();
    }

    pub fn resume(&self) {
        self.core.resume();
    }

    pub fn add(&self, job: T) -> bool {
        self.core.add(job)
    }

    pub fn clear_jobs(&self) -> usize {
        self.core.clear_jobs()
    }

    /// Stops the stage for good and detaches it from both neighbours. The
    /// neighbours keep running.
    pub fn dispose(&self) {
        self.core.dispose();
        self.registry.remove(self.id);
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

    pub fn predecessor(&self) -> Option<StageId> {
        self.registry.predecessor_of(self.id)
    }

    pub fn successor(&self) -> Option<StageId> {
        self.registry.successor_of(self.id)
    }

    pub fn state(&self) -> ExecutionState {
        self.core.state()
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    pub fn is_suspended(&self) -> bool {
        self.core.is_paused()
    }

    pub fn job_count(&self) -> usize {
        self.core.job_count()
    }

    pub fn is_empty(&self) -> bool {
        self.job_count() == 0
    }
}

impl<T: Send + 'static> Drop for Stage<T> {
    fn drop(&mut self) {
        self.dispose();
        self.core.join();
    }
}

pub struct StageBuilder<'a, T: Send + 'static> {
    topology: &'a Topology<T>,
    name: String,
    listeners: Vec<StopListener>,
}

impl<'a, T: Send + 'static> StageBuilder<'a, T> {
    pub(crate) fn new(topology: &'a Topology<T>, name: &str) -> Self {
        Self {
            topology,
            name: name.to_string(),
            listeners: Vec::new(),
        }
    }

    pub fn on_stopped<F>(mut self, listener: F) -> Self
    where
        F: Fn(&StopCause) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn build<H: JobHandler<T>>(self, handler: H) -> Stage<T> {
        let id = StageId::next();
        let registry = Arc::clone(self.topology.registry());

        let weak = Arc::downgrade(&registry);
        let forward: ForwardHook<T> = Box::new(move |job: T| {
            if let Some(registry) = weak.upgrade() {
                registry.forward(id, job);
            }
        });

        let options = ExecutorOptions {
            thread_name: format!("{}-{}", self.topology.thread_name_prefix(), self.name),
            name: self.name,
            idle: IdleStrategy::Block,
            poll_interval: DEFAULT_POLL_INTERVAL,
            listeners: self.listeners,
        };

        let core = Arc::new(Executor::new(options, Box::new(handler), Some(forward)));
        registry.insert(id, Arc::clone(&core));

        Stage { id, core, registry }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::mpsc::{channel, Receiver, Sender};
    use std::thread;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(2);

    fn recording_stage(
        topology: &Topology<u32>,
        name: &'static str,
        tx: &Sender<(&'static str, u32)>,
    ) -> Stage<u32> {
        let tx = Mutex::new(tx.clone());
        topology.stage(name, move |job: &u32| {
            let _ = tx.lock().send((name, *job));
        })
    }

    fn expect_none(rx: &Receiver<(&'static str, u32)>) {
        assert!(rx.recv_timeout(Duration::from_millis(80)).is_err());
    }

    #[test]
    fn test_fifo_within_stage() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let stage = recording_stage(&topology, "s", &tx);
        stage.start();

        for job in 0..50 {
            stage.add(job);
        }

        let seen: Vec<u32> = (0..50)
            .filter_map(|_| rx.recv_timeout(WAIT).ok())
            .map(|(_, job)| job)
            .collect();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_add_while_stopped_is_dropped() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let stage = recording_stage(&topology, "s", &tx);

        assert!(!stage.add(1));
        expect_none(&rx);

        stage.start();
        stage.stop();
        stage.join();

        assert!(!stage.add(2));
        expect_none(&rx);
    }

    #[test]
    fn test_start_discards_jobs_queued_before_it() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let stage = recording_stage(&topology, "s", &tx);

        stage.add(1);
        stage.start();
        stage.add(2);

        assert_eq!(rx.recv_timeout(WAIT), Ok(("s", 2)));
        expect_none(&rx);
    }

    #[test]
    fn test_restart_begins_with_empty_queue() {
        let topology: Topology<u32> = Topology::new();
        let release = Arc::new(Mutex::new(()));
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);

        let gate = Arc::clone(&release);
        let stage = topology.stage("slow", move |job: &u32| {
            let _held = gate.lock();
            let _ = tx.lock().send(*job);
        });

        let hold = release.lock();
        stage.start();
        stage.add(1);
        stage.add(2);
        stage.add(3);

        // Job 1 is stuck in the handler; 2 and 3 are still queued.
        thread::sleep(Duration::from_millis(30));
        stage.stop();
        drop(hold);
        stage.join();

        assert_eq!(rx.recv_timeout(WAIT), Ok(1));
        assert!(rx.recv_timeout(Duration::from_millis(80)).is_err());
        assert!(stage.is_empty());

        stage.start();
        stage.add(4);
        assert_eq!(rx.recv_timeout(WAIT), Ok(4));
    }

    #[test]
    fn test_forwarding_to_successor() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let a = recording_stage(&topology, "a", &tx);
        let b = recording_stage(&topology, "b", &tx);

        Stage::connect(&a, &b, LinkAction::BOTH).unwrap();
        assert!(a.is_running());
        assert!(b.is_running());

        a.add(42);

        assert_eq!(rx.recv_timeout(WAIT), Ok(("a", 42)));
        assert_eq!(rx.recv_timeout(WAIT), Ok(("b", 42)));
    }

    #[test]
    fn test_forwarding_preserves_completion_order() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let a = recording_stage(&topology, "a", &tx);
        let b = recording_stage(&topology, "b", &tx);
        Stage::connect(&a, &b, LinkAction::BOTH).unwrap();

        for job in 0..20 {
            a.add(job);
        }

        let mut at_b = Vec::new();
        let deadline = Instant::now() + WAIT;
        while at_b.len() < 20 && Instant::now() < deadline {
            if let Ok(("b", job)) = rx.recv_timeout(WAIT) {
                at_b.push(job);
            }
        }
        assert_eq!(at_b, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_stopped_successor_drops_forwarded_jobs() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let a = recording_stage(&topology, "a", &tx);
        let b = recording_stage(&topology, "b", &tx);

        Stage::connect(&a, &b, LinkAction::PREVIOUS).unwrap();
        a.add(5);

        assert_eq!(rx.recv_timeout(WAIT), Ok(("a", 5)));
        expect_none(&rx);
        assert!(b.is_empty());
    }

    #[test]
    fn test_end_to_end_three_stage_chain() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let x = recording_stage(&topology, "x", &tx);
        let y = recording_stage(&topology, "y", &tx);
        let z = recording_stage(&topology, "z", &tx);

        Stage::connect(&x, &y, LinkAction::BOTH).unwrap();
        Stage::connect(&y, &z, LinkAction::BOTH).unwrap();

        let started = Instant::now();
        x.add(42);

        assert_eq!(rx.recv_timeout(WAIT), Ok(("x", 42)));
        assert_eq!(rx.recv_timeout(WAIT), Ok(("y", 42)));
        assert_eq!(rx.recv_timeout(WAIT), Ok(("z", 42)));
        assert!(started.elapsed() < WAIT);

        assert_eq!(z.successor(), None);
        expect_none(&rx);
    }

    #[test]
    fn test_suspend_and_resume() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let stage = recording_stage(&topology, "s", &tx);
        stage.start();
        stage.suspend();
        assert!(stage.is_suspended());

        thread::sleep(Duration::from_millis(20));
        for job in 1..=4 {
            stage.add(job);
        }

        expect_none(&rx);
        assert_eq!(stage.job_count(), 4);

        stage.resume();
        assert!(!stage.is_suspended());

        let seen: Vec<u32> = (0..4)
            .filter_map(|_| rx.recv_timeout(WAIT).ok())
            .map(|(_, job)| job)
            .collect();
        assert_eq!(seen, vec![1, 2, 3, 4]);
        expect_none(&rx);
    }

    #[test]
    fn test_clear_jobs_keeps_running() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let stage = recording_stage(&topology, "s", &tx);
        stage.start();
        stage.suspend();

        stage.add(1);
        stage.add(2);
        assert_eq!(stage.clear_jobs(), 2);
        assert!(stage.is_empty());
        assert!(stage.is_running());

        stage.resume();
        stage.add(3);
        assert_eq!(rx.recv_timeout(WAIT), Ok(("s", 3)));
        expect_none(&rx);
    }

    #[test]
    fn test_connect_replaces_existing_links() {
        let topology: Topology<u32> = Topology::new();
        let (tx, _rx) = channel();
        let a = recording_stage(&topology, "a", &tx);
        let b = recording_stage(&topology, "b", &tx);
        let c = recording_stage(&topology, "c", &tx);
        let d = recording_stage(&topology, "d", &tx);

        Stage::connect(&a, &b, LinkAction::NONE).unwrap();
        Stage::connect(&c, &d, LinkAction::NONE).unwrap();

        // a already has a successor, d already has a predecessor.
        Stage::connect(&a, &d, LinkAction::NONE).unwrap();

        assert_eq!(a.successor(), Some(d.id()));
        assert_eq!(d.predecessor(), Some(a.id()));
        assert_eq!(b.predecessor(), None);
        assert_eq!(c.successor(), None);
    }

    #[test]
    fn test_disconnect_mismatched_pair_fails_without_mutation() {
        let topology: Topology<u32> = Topology::new();
        let (tx, _rx) = channel();
        let a = recording_stage(&topology, "a", &tx);
        let b = recording_stage(&topology, "b", &tx);
        let c = recording_stage(&topology, "c", &tx);

        Stage::connect(&a, &b, LinkAction::BOTH).unwrap();

        assert_eq!(
            Stage::disconnect(&b, &a, LinkAction::BOTH),
            Err(TopologyError::NotLinked { previous: b.id(), next: a.id() })
        );
        assert_eq!(
            Stage::disconnect(&a, &c, LinkAction::BOTH),
            Err(TopologyError::NotLinked { previous: a.id(), next: c.id() })
        );

        assert_eq!(a.successor(), Some(b.id()));
        assert_eq!(b.predecessor(), Some(a.id()));
        assert!(a.is_running());
        assert!(b.is_running());
    }

    #[test]
    fn test_disconnect_stops_forwarding() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let a = recording_stage(&topology, "a", &tx);
        let b = recording_stage(&topology, "b", &tx);

        Stage::connect(&a, &b, LinkAction::BOTH).unwrap();
        Stage::disconnect(&a, &b, LinkAction::NONE).unwrap();

        assert_eq!(a.successor(), None);
        assert_eq!(b.predecessor(), None);
        assert!(a.is_running());
        assert!(b.is_running());

        a.add(7);
        assert_eq!(rx.recv_timeout(WAIT), Ok(("a", 7)));
        expect_none(&rx);
    }

    #[test]
    fn test_disconnect_applies_stop_action() {
        let topology: Topology<u32> = Topology::new();
        let (tx, _rx) = channel();
        let a = recording_stage(&topology, "a", &tx);
        let b = recording_stage(&topology, "b", &tx);

        Stage::connect(&a, &b, LinkAction::BOTH).unwrap();
        Stage::disconnect(&a, &b, LinkAction::NEXT).unwrap();
        b.join();

        assert!(a.is_running());
        assert_eq!(b.state(), ExecutionState::Stopped);
    }

    #[test]
    fn test_foreign_stages_cannot_link() {
        let left: Topology<u32> = Topology::new();
        let right: Topology<u32> = Topology::new();
        let (tx, _rx) = channel();
        let a = recording_stage(&left, "a", &tx);
        let b = recording_stage(&right, "b", &tx);

        assert_eq!(
            Stage::connect(&a, &b, LinkAction::NONE),
            Err(TopologyError::ForeignStage)
        );
        assert_eq!(
            Stage::disconnect(&a, &b, LinkAction::NONE),
            Err(TopologyError::ForeignStage)
        );
    }

    #[test]
    fn test_connect_disposed_stage_fails() {
        let topology: Topology<u32> = Topology::new();
        let (tx, _rx) = channel();
        let a = recording_stage(&topology, "a", &tx);
        let b = recording_stage(&topology, "b", &tx);
        b.dispose();

        assert_eq!(
            Stage::connect(&a, &b, LinkAction::BOTH),
            Err(TopologyError::StageNotFound(b.id()))
        );
        assert_eq!(a.successor(), None);
        assert!(!a.is_running());
    }

    #[test]
    fn test_dispose_detaches_neighbours() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let x = recording_stage(&topology, "x", &tx);
        let y = recording_stage(&topology, "y", &tx);
        let z = recording_stage(&topology, "z", &tx);

        Stage::connect(&x, &y, LinkAction::BOTH).unwrap();
        Stage::connect(&y, &z, LinkAction::BOTH).unwrap();

        y.dispose();
        y.join();

        assert_eq!(x.successor(), None);
        assert_eq!(z.predecessor(), None);
        assert!(x.is_running());
        assert!(z.is_running());
        assert_eq!(y.state(), ExecutionState::Disposed);

        assert!(!y.start());
        assert!(!y.add(1));

        x.add(9);
        assert_eq!(rx.recv_timeout(WAIT), Ok(("x", 9)));
        expect_none(&rx);
    }

    #[test]
    fn test_stop_listener_on_builder() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        let stage = topology
            .stage_builder("notify")
            .on_stopped(move |cause| {
                let _ = tx.lock().send(cause.clone());
            })
            .build(|_: &u32| {});

        stage.start();
        assert!(!stage.start());
        stage.stop();
        stage.join();

        assert_eq!(rx.recv_timeout(WAIT), Ok(StopCause::Requested));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_panicking_stage_reports_and_restarts() {
        let topology: Topology<u32> = Topology::new();
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        let stage = topology.stage("fragile", |job: &u32| {
            if *job == 0 {
                panic!("zero is not a job");
            }
        });
        stage.on_stopped(move |cause| {
            let _ = tx.lock().send(cause.clone());
        });

        stage.start();
        stage.add(0);

        let cause = rx.recv_timeout(WAIT).unwrap();
        assert!(cause.is_panic());
        stage.join();
        assert_eq!(stage.state(), ExecutionState::Stopped);

        assert!(stage.start());
        assert!(stage.add(1));
    }
}
