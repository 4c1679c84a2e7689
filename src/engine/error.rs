// Fri Oct 16 2026 - Alex

use crate::engine::topology::StageId;
use thiserror::Error;

/// Invalid use of [`Stage::connect`](crate::engine::Stage::connect) or
/// [`Stage::disconnect`](crate::engine::Stage::disconnect). These are caller
/// mistakes and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Stage not found: {0}")]
    StageNotFound(StageId),
    #[error("Stages belong to different topologies")]
    ForeignStage,
    #[error("Stage cannot be linked to itself: {0}")]
    SelfLink(StageId),
    #[error("Stages are not linked: {previous} -> {next}")]
    NotLinked { previous: StageId, next: StageId },
}
