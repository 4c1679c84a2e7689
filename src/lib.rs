// Fri Oct 16 2026 - Alex

pub mod config;
pub mod engine;
pub mod utils;

pub use config::EngineConfig;
pub use engine::{
    ExecutionState, JobHandler, LinkAction, Stage, StageId, StopCause, Topology, TopologyError,
    Worker,
};
