//! Core domain errors.

use thiserror::Error;

use crate::status::RunStatus;

/// Core domain errors for TaskPilot.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: RunStatus, to: RunStatus },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A start/pause/resume request issued in a state that does not allow it.
///
/// Returned synchronously to the caller and never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A run is already active.
    #[error("Agent already running (status: {0})")]
    Busy(RunStatus),

    /// Pause requested while no run is executing.
    #[error("Agent not running (status: {0})")]
    NotRunning(RunStatus),

    /// Resume requested while the run is not paused.
    #[error("Agent not paused (status: {0})")]
    NotPaused(RunStatus),

    /// The task text produced no actions.
    #[error("Task contains no recognizable instructions")]
    EmptyTask,
}
