//! Status enums for runs and individual steps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of the run controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No run is active.
    #[default]
    Idle,
    /// A run is actively executing actions.
    Running,
    /// The run is suspended between two actions.
    Paused,
    /// A stop was requested; the worker has not yet observed it.
    Stopping,
    /// Every action of the run was consumed.
    Completed,
    /// The run aborted on a platform failure.
    Error,
}

impl RunStatus {
    /// Returns true if a new run may be started from this status.
    pub fn accepts_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Error)
    }

    /// Returns true while a worker owns the run.
    pub fn is_active(&self) -> bool {
        !self.accepts_start()
    }

    /// Returns true if the run reached an end state on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result classification of one executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The action was performed.
    Succeeded,
    /// Every locator strategy was exhausted; the run continues.
    Warning,
    /// The execution surface raised during the action; the run continues.
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Warning => "warning",
            Self::Failed => "failed",
        }
    }
}
