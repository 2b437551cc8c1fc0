//! The TaskRun record owned by the run controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::CoreError;
use crate::ids::RunId;
use crate::outcome::StepOutcome;
use crate::status::RunStatus;

/// One execution attempt of a parsed action sequence.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub id: RunId,
    /// The instruction text the actions were parsed from.
    pub task: String,
    pub status: RunStatus,
    pub actions: Vec<Action>,
    /// Index of the next action to execute. Never decreases and never
    /// exceeds `actions.len()`.
    current_index: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub pause_requested: bool,
    pub stop_requested: bool,
    /// Ordered result log; entry `i` describes action `i`.
    pub results: Vec<StepOutcome>,
}

impl TaskRun {
    /// Create a new run in the running state.
    pub fn new(task: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            id: RunId::generate(),
            task: task.into(),
            status: RunStatus::Running,
            actions,
            current_index: 0,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            pause_requested: false,
            stop_requested: false,
            results: Vec::new(),
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The action at `current_index` with its 1-based step number.
    pub fn next_action(&self) -> Option<(usize, &Action)> {
        self.actions
            .get(self.current_index)
            .map(|action| (self.current_index + 1, action))
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.actions.len()
    }

    /// Record the outcome of the action at `current_index` and advance.
    pub fn record(&mut self, outcome: StepOutcome) -> Result<(), CoreError> {
        if self.is_exhausted() {
            return Err(CoreError::InvalidInput(format!(
                "run {} has no action left to record step {} against",
                self.id, outcome.step
            )));
        }
        if outcome.step != self.current_index + 1 {
            return Err(CoreError::InvalidInput(format!(
                "step {} recorded out of order (expected {})",
                outcome.step,
                self.current_index + 1
            )));
        }
        self.results.push(outcome);
        self.current_index += 1;
        Ok(())
    }

    /// Move to `to`, checking the controller's transition table.
    pub fn transition(&mut self, to: RunStatus) -> Result<(), CoreError> {
        use RunStatus::*;
        let allowed = matches!(
            (self.status, to),
            (Running, Paused)
                | (Paused, Running)
                | (Running | Paused, Stopping)
                | (Stopping | Completed | Error, Idle)
                | (Running, Completed)
                | (Running | Paused | Stopping, Error)
        );
        if !allowed {
            return Err(CoreError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if matches!(to, Idle | Completed | Error) && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            status: self.status,
            run_id: Some(self.id.clone()),
            current_index: self.current_index,
            steps_completed: self.results.len(),
            total_actions: self.actions.len(),
            started_at: Some(self.started_at),
            error: self.error.clone(),
        }
    }
}

/// Point-in-time view of the controller, as returned by `status()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub status: RunStatus,
    pub run_id: Option<RunId>,
    pub current_index: usize,
    pub steps_completed: usize,
    pub total_actions: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RunSnapshot {
    /// Snapshot of a controller that never ran anything.
    pub fn idle() -> Self {
        Self {
            status: RunStatus::Idle,
            run_id: None,
            current_index: 0,
            steps_completed: 0,
            total_actions: 0,
            started_at: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step_run() -> TaskRun {
        TaskRun::new(
            "go to example.com; submit",
            vec![Action::navigate("example.com"), Action::submit()],
        )
    }

    #[test]
    fn test_record_advances_index() {
        let mut run = two_step_run();
        assert_eq!(run.next_action().map(|(step, _)| step), Some(1));

        run.record(StepOutcome::succeeded(1, Action::navigate("example.com"), "ok"))
            .unwrap();
        assert_eq!(run.current_index(), 1);
        assert_eq!(run.next_action().map(|(step, _)| step), Some(2));

        run.record(StepOutcome::succeeded(2, Action::submit(), "ok"))
            .unwrap();
        assert!(run.is_exhausted());
        assert!(run.next_action().is_none());
    }

    #[test]
    fn test_record_rejects_out_of_order_step() {
        let mut run = two_step_run();
        let err = run
            .record(StepOutcome::succeeded(2, Action::submit(), "ok"))
            .unwrap_err();
        assert!(err.to_string().contains("out of order"));
        assert_eq!(run.current_index(), 0);
    }

    #[test]
    fn test_record_past_end_is_rejected() {
        let mut run = TaskRun::new("submit", vec![Action::submit()]);
        run.record(StepOutcome::succeeded(1, Action::submit(), "ok"))
            .unwrap();
        assert!(run
            .record(StepOutcome::succeeded(2, Action::submit(), "ok"))
            .is_err());
        assert_eq!(run.current_index(), 1);
    }

    #[test]
    fn test_transition_table() {
        let mut run = two_step_run();
        run.transition(RunStatus::Paused).unwrap();
        run.transition(RunStatus::Running).unwrap();
        run.transition(RunStatus::Stopping).unwrap();
        assert!(run.transition(RunStatus::Running).is_err());
        run.transition(RunStatus::Idle).unwrap();
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_terminal_states_reset_to_idle() {
        let mut run = two_step_run();
        run.transition(RunStatus::Completed).unwrap();
        let finished = run.finished_at;
        run.transition(RunStatus::Idle).unwrap();
        assert_eq!(run.finished_at, finished);
        assert!(run.transition(RunStatus::Running).is_err());
    }

    #[test]
    fn test_completed_only_from_running() {
        let mut run = two_step_run();
        run.transition(RunStatus::Paused).unwrap();
        let err = run.transition(RunStatus::Completed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state transition: paused -> completed"
        );
    }
}
