//! Run command handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use taskpilot_core::CommandError;

use crate::http::responses::{
    CommandResponse, ErrorResponse, ResultsResponse, StartRequest, StartResponse,
};
use crate::state::AppState;

/// Start a run for the given instruction.
pub async fn start_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Response {
    match state.controller.start_run_with(&req.task, req.options()) {
        Ok(run_id) => {
            info!(run_id = %run_id, "Run accepted");
            Json(StartResponse {
                status: "started",
                run_id,
            })
            .into_response()
        }
        Err(e) => rejected(e),
    }
}

pub async fn pause_agent(State(state): State<Arc<AppState>>) -> Response {
    match state.controller.pause() {
        Ok(()) => Json(CommandResponse { status: "paused" }).into_response(),
        Err(e) => rejected(e),
    }
}

pub async fn resume_agent(State(state): State<Arc<AppState>>) -> Response {
    match state.controller.resume() {
        Ok(()) => Json(CommandResponse { status: "resumed" }).into_response(),
        Err(e) => rejected(e),
    }
}

/// Stop never fails; it is a no-op without an active run.
pub async fn stop_agent(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.controller.stop();
    Json(CommandResponse { status: "stopped" })
}

pub async fn agent_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.controller.status())
}

/// Step log of the current or most recent run.
pub async fn agent_results(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let run_id = state.controller.status().run_id;
    Json(ResultsResponse {
        run_id,
        steps: state.controller.results(),
    })
}

fn rejected(error: CommandError) -> Response {
    let status = match error {
        CommandError::EmptyTask => StatusCode::BAD_REQUEST,
        CommandError::Busy(_) | CommandError::NotRunning(_) | CommandError::NotPaused(_) => {
            StatusCode::CONFLICT
        }
    };
    warn!(error = %error, "Command rejected");
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}
