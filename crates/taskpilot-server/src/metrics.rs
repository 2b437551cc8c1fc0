//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use taskpilot_core::RunStatus;

use crate::state::AppState;

const STATUSES: [RunStatus; 6] = [
    RunStatus::Idle,
    RunStatus::Running,
    RunStatus::Paused,
    RunStatus::Stopping,
    RunStatus::Completed,
    RunStatus::Error,
];

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_run_metrics(state, &mut output);
    collect_step_metrics(state, &mut output);
    collect_stream_metrics(state, &mut output).await;

    output
}

fn collect_run_metrics(state: &Arc<AppState>, output: &mut String) {
    let snapshot = state.metrics.snapshot();
    let current = state.controller.status().status;

    writeln!(output, "# HELP taskpilot_runs_total Runs by outcome").ok();
    writeln!(output, "# TYPE taskpilot_runs_total counter").ok();
    for (outcome, value) in [
        ("started", snapshot.runs_started),
        ("completed", snapshot.runs_completed),
        ("failed", snapshot.runs_failed),
        ("stopped", snapshot.runs_stopped),
        ("simulated", snapshot.runs_simulated),
    ] {
        writeln!(output, "taskpilot_runs_total{{outcome=\"{outcome}\"}} {value}").ok();
    }

    writeln!(
        output,
        "# HELP taskpilot_run_status Current controller status (1 for the active one)"
    )
    .ok();
    writeln!(output, "# TYPE taskpilot_run_status gauge").ok();
    for status in STATUSES {
        let value = u8::from(status == current);
        writeln!(output, "taskpilot_run_status{{status=\"{status}\"}} {value}").ok();
    }
}

fn collect_step_metrics(state: &Arc<AppState>, output: &mut String) {
    let snapshot = state.metrics.snapshot();

    writeln!(output, "# HELP taskpilot_steps_total Executed actions by result").ok();
    writeln!(output, "# TYPE taskpilot_steps_total counter").ok();
    writeln!(
        output,
        "taskpilot_steps_total{{status=\"succeeded\"}} {}",
        snapshot.steps_succeeded
    )
    .ok();
    writeln!(
        output,
        "taskpilot_steps_total{{status=\"warning\"}} {}",
        snapshot.steps_warning
    )
    .ok();
    writeln!(
        output,
        "taskpilot_steps_total{{status=\"failed\"}} {}",
        snapshot.steps_failed
    )
    .ok();
}

async fn collect_stream_metrics(state: &Arc<AppState>, output: &mut String) {
    let subscribers = state.hub.subscriber_count().await;

    writeln!(
        output,
        "# HELP taskpilot_stream_subscribers Connected live stream subscribers"
    )
    .ok();
    writeln!(output, "# TYPE taskpilot_stream_subscribers gauge").ok();
    writeln!(output, "taskpilot_stream_subscribers {subscribers}").ok();
}
