//! The blocking execution loop of one run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::MutexGuard;
use serde_json::json;
use tracing::{debug, error, info, warn};

use taskpilot_core::{Action, Event, RunId, RunStatus, StepOutcome, TaskRun};

use crate::bridge::EventSink;
use crate::config::EngineConfig;
use crate::controller::{apply_status, ControllerState, Shared};
use crate::executor::{ActionExecutor, PlatformFailure, Sleeper, StepContext};
use crate::metrics::EngineMetrics;
use crate::page::{PageCapability, PageConnector};

enum Next {
    Step(usize, Action),
    /// The run is winding down; release the page before it settles.
    Release,
    Finished,
}

pub(crate) struct RunWorker {
    pub(crate) shared: Arc<Shared>,
    pub(crate) executor: Arc<ActionExecutor>,
    pub(crate) pages: Arc<dyn PageConnector>,
    pub(crate) sink: EventSink,
    pub(crate) config: EngineConfig,
    pub(crate) metrics: Arc<EngineMetrics>,
    pub(crate) run_id: RunId,
}

impl RunWorker {
    pub(crate) fn run(self) {
        let task = {
            let state = self.shared.state.lock();
            match self.current(&state) {
                Some(run) => run.task.clone(),
                None => return,
            }
        };

        let mut page = match self.pages.connect() {
            Ok(page) => {
                info!(run_id = %self.run_id, backend = %self.pages.name(), "Page connected");
                Some(page)
            }
            Err(e) => {
                warn!(run_id = %self.run_id, error = %e, "Page unavailable, simulating run");
                self.metrics.run_simulated();
                None
            }
        };

        let mut ctx = StepContext::new(task).with_sleeper(self.sleeper());
        loop {
            let (step, action) = match self.checkpoint(page.is_some()) {
                Next::Step(step, action) => (step, action),
                Next::Release => {
                    self.release(&mut page);
                    continue;
                }
                Next::Finished => break,
            };

            let result = match page.as_deref() {
                Some(page) => self.executor.execute(step, &action, page, &mut ctx),
                None => Ok(self.simulate(step, &action)),
            };
            if result.is_err() {
                self.release(&mut page);
            }
            if !self.finish_step(result) {
                break;
            }
        }
        self.release(&mut page);

        info!(run_id = %self.run_id, "Run worker finished");
    }

    /// Close the page, if still open.
    fn release(&self, page: &mut Option<Box<dyn PageCapability>>) {
        if let Some(page) = page.take() {
            match page.close() {
                Ok(()) => debug!(run_id = %self.run_id, "Page closed"),
                Err(e) => debug!(run_id = %self.run_id, error = %e, "Page close failed"),
            }
        }
    }

    fn sleeper(&self) -> Sleeper {
        let shared = self.shared.clone();
        let run_id = self.run_id.clone();
        Arc::new(move |duration| sleep_unless_stopped(&shared, &run_id, duration))
    }

    fn current<'a>(&self, state: &'a ControllerState) -> Option<&'a TaskRun> {
        state.run.as_ref().filter(|r| r.id == self.run_id)
    }

    fn current_mut<'a>(&self, state: &'a mut MutexGuard<'_, ControllerState>) -> Option<&'a mut TaskRun> {
        state.run.as_mut().filter(|r| r.id == self.run_id)
    }

    /// Between actions: honor stop and pause, detect completion, or hand out
    /// the next action. A run never settles while `page_open`.
    fn checkpoint(&self, page_open: bool) -> Next {
        let mut state = self.shared.state.lock();
        loop {
            let Some(run) = self.current_mut(&mut state) else {
                return Next::Finished;
            };

            if run.stop_requested {
                if page_open {
                    return Next::Release;
                }
                if let Err(e) = apply_status(run, RunStatus::Idle, &self.sink) {
                    warn!(run_id = %self.run_id, error = %e, "Could not settle stopped run");
                }
                info!(
                    run_id = %self.run_id,
                    skipped = run.actions.len() - run.current_index(),
                    "Run stopped"
                );
                self.metrics.run_stopped();
                self.shared.signal.notify_all();
                return Next::Finished;
            }

            if run.pause_requested {
                let poll = self.config.pause_poll_interval();
                self.shared.signal.wait_for(&mut state, poll);
                continue;
            }

            if let Some((step, action)) = run.next_action() {
                return Next::Step(step, action.clone());
            }

            if page_open {
                return Next::Release;
            }

            if let Err(e) = apply_status(run, RunStatus::Completed, &self.sink) {
                warn!(run_id = %self.run_id, error = %e, "Could not complete run");
            }
            self.metrics.run_completed();
            self.shared.signal.notify_all();
            return Next::Finished;
        }
    }

    /// Record a finished action. Returns whether the loop may continue.
    fn finish_step(&self, result: Result<StepOutcome, PlatformFailure>) -> bool {
        let mut state = self.shared.state.lock();
        let Some(run) = self.current_mut(&mut state) else {
            return false;
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) if run.stop_requested => return true,
            Err(failure) => {
                self.fail(run, failure.to_string());
                return false;
            }
        };

        let stopping = run.stop_requested;
        let status = outcome.status;
        info!(
            run_id = %self.run_id,
            step = outcome.step,
            status = %status.as_str(),
            message = %outcome.message,
            "Step finished"
        );
        if let Err(e) = run.record(outcome.clone()) {
            self.fail(run, e.to_string());
            return false;
        }
        self.metrics.step(status);
        if !stopping {
            self.sink.emit(Event::step(self.run_id.clone(), outcome));
        }
        true
    }

    fn fail(&self, run: &mut TaskRun, message: String) {
        error!(run_id = %self.run_id, error = %message, "Run failed");
        run.error = Some(message.clone());
        self.sink.emit(Event::error(Some(self.run_id.clone()), message));
        if let Err(e) = apply_status(run, RunStatus::Error, &self.sink) {
            warn!(run_id = %self.run_id, error = %e, "Could not mark run as failed");
        }
        self.metrics.run_failed();
        self.shared.signal.notify_all();
    }

    /// Stand-in for an action when no page is available. Sleeps for the
    /// simulation interval unless a stop arrives first.
    fn simulate(&self, step: usize, action: &Action) -> StepOutcome {
        sleep_unless_stopped(&self.shared, &self.run_id, self.config.simulation_step_interval());
        StepOutcome::succeeded(step, action.clone(), format!("Simulated: {}", action))
            .with_data(json!({ "simulated": true }))
    }
}

/// Sleep for `duration` on the shared condvar. Returns false when a stop
/// request (or a replaced run) cut the sleep short.
fn sleep_unless_stopped(shared: &Shared, run_id: &RunId, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    let mut state = shared.state.lock();
    loop {
        let stopping = state
            .run
            .as_ref()
            .filter(|run| &run.id == run_id)
            .map_or(true, |run| run.stop_requested);
        if stopping {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        shared.signal.wait_for(&mut state, deadline - now);
    }
}
