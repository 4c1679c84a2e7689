// Fri Oct 16 2026 - Alex

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Disposed,
}

impl ExecutionState {
    /// Jobs are accepted and processed only in these states.
    pub fn is_running(&self) -> bool {
        matches!(self, ExecutionState::Starting | ExecutionState::Running)
    }

    pub fn is_disposed(&self) -> bool {
        *self == ExecutionState::Disposed
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionState::Stopped => "stopped",
            ExecutionState::Starting => "starting",
            ExecutionState::Running => "running",
            ExecutionState::Stopping => "stopping",
            ExecutionState::Disposed => "disposed",
        };
        write!(f, "{}", s)
    }
}

/// Why a background loop exited. Delivered to stop listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    Requested,
    JobPanicked { message: String },
}

impl StopCause {
    pub fn is_panic(&self) -> bool {
        matches!(self, StopCause::JobPanicked { .. })
    }

    pub fn panic_message(&self) -> Option<&str> {
        match self {
            StopCause::JobPanicked { message } => Some(message),
            StopCause::Requested => None,
        }
    }
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCause::Requested => write!(f, "stop requested"),
            StopCause::JobPanicked { message } => write!(f, "job panicked: {}", message),
        }
    }
}
