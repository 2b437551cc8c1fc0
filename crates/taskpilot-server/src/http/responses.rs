//! HTTP request and response types.

use serde::{Deserialize, Serialize};

use taskpilot_core::{RunId, StepOutcome};
use taskpilot_engine::RunOptions;

// ============================================================================
// Agent command types
// ============================================================================

/// Request body for the start endpoint.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Natural-language instruction.
    pub task: String,

    #[serde(default)]
    pub context: Option<TaskContext>,

    /// Upper bound on executed actions for this run.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl StartRequest {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            start_url: self.context.as_ref().and_then(|c| c.url.clone()),
            max_actions: self.max_steps,
        }
    }
}

/// Optional context sent with a task.
#[derive(Debug, Default, Deserialize)]
pub struct TaskContext {
    /// Page to open before the first action.
    #[serde(default)]
    pub url: Option<String>,
}

/// Response body for the start endpoint.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: &'static str,
    pub run_id: RunId,
}

/// Response body for pause, resume and stop.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: &'static str,
}

/// Response body for the results endpoint.
#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub run_id: Option<RunId>,
    pub steps: Vec<StepOutcome>,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
