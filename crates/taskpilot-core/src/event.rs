//! Externally visible telemetry events.

use serde::{Deserialize, Serialize};

use crate::ids::RunId;
use crate::outcome::StepOutcome;
use crate::status::RunStatus;

/// One unit of telemetry delivered to subscribers.
///
/// Events of a run are emitted in execution order and delivered in that
/// same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// First event every subscriber receives, carrying the status at
    /// subscription time.
    Connected { status: RunStatus },

    /// The controller moved to a new lifecycle status.
    #[serde(rename = "status")]
    StatusChanged {
        status: RunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
    },

    /// One action was executed.
    Step { run_id: RunId, outcome: StepOutcome },

    /// The run hit a platform failure.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
        message: String,
    },
}

impl Event {
    pub fn status(status: RunStatus, run_id: Option<RunId>) -> Self {
        Self::StatusChanged { status, run_id }
    }

    pub fn step(run_id: RunId, outcome: StepOutcome) -> Self {
        Self::Step { run_id, outcome }
    }

    pub fn error(run_id: Option<RunId>, message: impl Into<String>) -> Self {
        Self::Error {
            run_id,
            message: message.into(),
        }
    }

    /// Short label for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::StatusChanged { .. } => "status",
            Self::Step { .. } => "step",
            Self::Error { .. } => "error",
        }
    }

    pub fn run_id(&self) -> Option<&RunId> {
        match self {
            Self::Connected { .. } => None,
            Self::StatusChanged { run_id, .. } | Self::Error { run_id, .. } => run_id.as_ref(),
            Self::Step { run_id, .. } => Some(run_id),
        }
    }
}
