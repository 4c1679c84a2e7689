// Fri Oct 16 2026 - Alex

pub mod error;
pub mod executor;
pub mod gate;
pub mod queue;
pub mod stage;
pub mod state;
pub mod topology;
pub mod worker;

pub use error::TopologyError;
pub use executor::{JobHandler, StopListener, DEFAULT_POLL_INTERVAL};
pub use gate::SuspendGate;
pub use queue::JobQueue;
pub use stage::{Stage, StageBuilder};
pub use state::{ExecutionState, StopCause};
pub use topology::{LinkAction, StageId, Topology};
pub use worker::{Worker, WorkerBuilder};
