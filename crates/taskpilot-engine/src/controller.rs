//! Run lifecycle state machine.
//!
//! One [`RunController`] owns the current [`TaskRun`]. Commands arrive from
//! the async side and only flip flags or statuses under the state lock;
//! the worker thread observes them between actions. Every status change is
//! emitted while the lock is held, so the event order always matches the
//! order of state changes.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{error, info, warn};

use taskpilot_core::{
    Action, CommandError, CoreError, Event, RunId, RunSnapshot, RunStatus, StepOutcome, TaskRun,
};

use crate::bridge::EventSink;
use crate::config::EngineConfig;
use crate::executor::ActionExecutor;
use crate::hub::Subscription;
use crate::metrics::EngineMetrics;
use crate::page::PageConnector;
use crate::parser::InstructionParser;
use crate::worker::RunWorker;

#[derive(Default)]
pub(crate) struct ControllerState {
    pub(crate) run: Option<TaskRun>,
}

impl ControllerState {
    pub(crate) fn status(&self) -> RunStatus {
        self.run.as_ref().map(|r| r.status).unwrap_or_default()
    }
}

/// State shared between the controller and its worker.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) state: Mutex<ControllerState>,
    /// Signalled on resume, stop and whenever a run settles.
    pub(crate) signal: Condvar,
}

/// Move `run` to `to` and announce it.
pub(crate) fn apply_status(
    run: &mut TaskRun,
    to: RunStatus,
    sink: &EventSink,
) -> Result<(), CoreError> {
    run.transition(to)?;
    info!(run_id = %run.id, status = %to, "Run status changed");
    sink.emit(Event::status(to, Some(run.id.clone())));
    Ok(())
}

/// Per-run overrides supplied with a start command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Page to open before the parsed actions.
    pub start_url: Option<String>,
    /// Cap on the number of actions; the configured cap when absent.
    pub max_actions: Option<usize>,
}

impl RunOptions {
    fn actions(&self, mut parsed: Vec<Action>) -> Vec<Action> {
        let start_url = self
            .start_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());
        if let Some(url) = start_url {
            parsed.insert(0, Action::navigate(url));
        }
        parsed
    }
}

pub struct RunController {
    shared: Arc<Shared>,
    parser: InstructionParser,
    executor: Arc<ActionExecutor>,
    pages: Arc<dyn PageConnector>,
    sink: EventSink,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl RunController {
    pub fn new(
        config: EngineConfig,
        parser: InstructionParser,
        executor: ActionExecutor,
        pages: Arc<dyn PageConnector>,
        sink: EventSink,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            parser,
            executor: Arc::new(executor),
            pages,
            sink,
            config,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    pub fn page_backend(&self) -> &'static str {
        self.pages.name()
    }

    /// Parse `task` and start executing it on a fresh worker thread.
    pub fn start_run(&self, task: &str) -> Result<RunId, CommandError> {
        self.start_run_with(task, RunOptions::default())
    }

    /// Like [`start_run`](Self::start_run), with per-run overrides.
    pub fn start_run_with(&self, task: &str, options: RunOptions) -> Result<RunId, CommandError> {
        let mut actions = options.actions(self.parser.parse(task));
        let max_actions = options.max_actions.unwrap_or(self.config.max_actions).max(1);

        let mut state = self.shared.state.lock();
        let current = state.status();
        if !current.accepts_start() {
            return Err(CommandError::Busy(current));
        }
        if actions.is_empty() {
            return Err(CommandError::EmptyTask);
        }
        if actions.len() > max_actions {
            warn!(
                parsed = actions.len(),
                max_actions,
                "Task has too many actions, truncating"
            );
            actions.truncate(max_actions);
        }

        let run = TaskRun::new(task, actions);
        let run_id = run.id.clone();
        info!(run_id = %run_id, actions = run.actions.len(), "Starting run");
        self.sink.emit(Event::status(RunStatus::Running, Some(run_id.clone())));
        state.run = Some(run);
        self.metrics.run_started();

        let worker = RunWorker {
            shared: self.shared.clone(),
            executor: self.executor.clone(),
            pages: self.pages.clone(),
            sink: self.sink.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            run_id: run_id.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("taskpilot-run-{}", short_id(&run_id)))
            .spawn(move || worker.run());

        if let Err(e) = spawned {
            error!(run_id = %run_id, error = %e, "Failed to spawn run worker");
            if let Some(run) = state.run.as_mut() {
                let message = format!("Failed to start worker: {}", e);
                run.error = Some(message.clone());
                self.sink.emit(Event::error(Some(run_id.clone()), message));
                if let Err(e) = apply_status(run, RunStatus::Error, &self.sink) {
                    warn!(error = %e, "Could not mark run as failed");
                }
            }
            self.metrics.run_failed();
        }

        Ok(run_id)
    }

    /// Suspend the run before its next action.
    pub fn pause(&self) -> Result<(), CommandError> {
        let mut state = self.shared.state.lock();
        let current = state.status();
        let Some(run) = state
            .run
            .as_mut()
            .filter(|r| r.status == RunStatus::Running)
        else {
            return Err(CommandError::NotRunning(current));
        };

        run.pause_requested = true;
        apply_status(run, RunStatus::Paused, &self.sink)
            .map_err(|_| CommandError::NotRunning(current))
    }

    /// Continue a paused run from where it stopped.
    pub fn resume(&self) -> Result<(), CommandError> {
        let mut state = self.shared.state.lock();
        let current = state.status();
        let Some(run) = state
            .run
            .as_mut()
            .filter(|r| r.status == RunStatus::Paused)
        else {
            return Err(CommandError::NotPaused(current));
        };

        run.pause_requested = false;
        apply_status(run, RunStatus::Running, &self.sink)
            .map_err(|_| CommandError::NotPaused(current))?;
        self.shared.signal.notify_all();
        Ok(())
    }

    /// Request the run to end. Always succeeds; a no-op when idle or
    /// already stopping. A finished run is reset to idle.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        let Some(run) = state.run.as_mut() else {
            return;
        };

        let result = match run.status {
            RunStatus::Idle | RunStatus::Stopping => return,
            status if status.is_terminal() => apply_status(run, RunStatus::Idle, &self.sink),
            _ => {
                run.stop_requested = true;
                run.pause_requested = false;
                let result = apply_status(run, RunStatus::Stopping, &self.sink);
                self.shared.signal.notify_all();
                result
            }
        };

        if let Err(e) = result {
            warn!(error = %e, "Stop could not change run status");
        }
    }

    pub fn status(&self) -> RunSnapshot {
        let state = self.shared.state.lock();
        state
            .run
            .as_ref()
            .map(TaskRun::snapshot)
            .unwrap_or_else(RunSnapshot::idle)
    }

    /// Result log of the current (or last) run.
    pub fn results(&self) -> Vec<StepOutcome> {
        let state = self.shared.state.lock();
        state
            .run
            .as_ref()
            .map(|r| r.results.clone())
            .unwrap_or_default()
    }

    /// Subscribe to events. The first event is `Connected` with the status at
    /// the moment of subscription; everything after it follows in order.
    pub async fn subscribe(&self) -> Option<Subscription> {
        let pending = {
            let state = self.shared.state.lock();
            self.sink.subscribe(Some(Event::Connected {
                status: state.status(),
            }))
        };
        pending?.await.ok()
    }

    /// Block until no run is active or `timeout` passes. Returns the status
    /// observed last.
    pub fn wait_until_settled(&self, timeout: Duration) -> RunStatus {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            let status = state.status();
            if !status.is_active() {
                return status;
            }
            let now = Instant::now();
            if now >= deadline {
                return status;
            }
            self.shared.signal.wait_for(&mut state, deadline - now);
        }
    }
}

fn short_id(id: &RunId) -> &str {
    id.as_str().get(..8).unwrap_or(id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::EventBridge;
    use crate::extract::Extractor;
    use crate::hub::BroadcastHub;
    use crate::page::UnavailableConnector;

    fn controller(bridge: &EventBridge) -> RunController {
        simulating(bridge, 5)
    }

    fn simulating(bridge: &EventBridge, simulation_step_interval_ms: u64) -> RunController {
        let config = EngineConfig {
            simulation_step_interval_ms,
            ..EngineConfig::default()
        };
        let executor = ActionExecutor::new(config.clone(), Arc::new(Extractor::heuristic()));
        RunController::new(
            config,
            InstructionParser::new(),
            executor,
            Arc::new(UnavailableConnector),
            bridge.sink(),
        )
    }

    #[tokio::test]
    async fn test_commands_rejected_when_idle() {
        let bridge = EventBridge::spawn(Arc::new(BroadcastHub::new(16)));
        let controller = controller(&bridge);

        assert_eq!(
            controller.pause(),
            Err(CommandError::NotRunning(RunStatus::Idle))
        );
        assert_eq!(
            controller.resume(),
            Err(CommandError::NotPaused(RunStatus::Idle))
        );
        controller.stop();
        assert_eq!(controller.status(), RunSnapshot::idle());
        assert!(controller.results().is_empty());
    }

    #[tokio::test]
    async fn test_empty_task_is_rejected() {
        let bridge = EventBridge::spawn(Arc::new(BroadcastHub::new(16)));
        let controller = controller(&bridge);
        assert_eq!(
            controller.start_run("make me a sandwich"),
            Err(CommandError::EmptyTask)
        );
        assert_eq!(controller.status().status, RunStatus::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_options_prepend_url_and_cap_actions() {
        let bridge = EventBridge::spawn(Arc::new(BroadcastHub::new(16)));
        let controller = controller(&bridge);

        let options = RunOptions {
            start_url: Some(" example.com ".into()),
            max_actions: Some(2),
        };
        controller
            .start_run_with("click Sign in; click Next; click Done", options)
            .unwrap();
        let status = tokio::task::block_in_place(|| {
            controller.wait_until_settled(Duration::from_secs(5))
        });
        assert_eq!(status, RunStatus::Completed);

        let actions: Vec<Action> = controller.results().into_iter().map(|o| o.action).collect();
        assert_eq!(actions, vec![Action::navigate("example.com"), Action::click("Sign in")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_url_alone_is_a_task() {
        let bridge = EventBridge::spawn(Arc::new(BroadcastHub::new(16)));
        let controller = controller(&bridge);

        let blank = RunOptions {
            start_url: Some("  ".into()),
            max_actions: None,
        };
        assert_eq!(
            controller.start_run_with("hello there", blank),
            Err(CommandError::EmptyTask)
        );

        let options = RunOptions {
            start_url: Some("example.com".into()),
            max_actions: Some(0),
        };
        controller.start_run_with("hello there", options).unwrap();
        let status = tokio::task::block_in_place(|| {
            controller.wait_until_settled(Duration::from_secs(5))
        });
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(controller.status().total_actions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simulated_run_settles() {
        let bridge = EventBridge::spawn(Arc::new(BroadcastHub::new(16)));
        let controller = controller(&bridge);
        let run_id = controller.start_run("go to example.com; wait 1 second").unwrap();

        let status = tokio::task::block_in_place(|| {
            controller.wait_until_settled(Duration::from_secs(5))
        });
        assert_eq!(status, RunStatus::Completed);

        let snapshot = controller.status();
        assert_eq!(snapshot.run_id, Some(run_id));
        assert_eq!(snapshot.current_index, 2);
        assert_eq!(controller.results().len(), 2);
        assert_eq!(controller.metrics().snapshot().runs_simulated, 1);
    }

    mod run_lifecycle {
        use super::*;
        use crate::bridge::EventBridge;
        use crate::extract::Extractor;
        use crate::hub::BroadcastHub;
        use crate::page::{Locator, PageError};
        use crate::strategy::click_strategies;
        use crate::testing::{eventually, PageScript, ScriptedConnector};
        use crate::{ActionExecutor, EngineConfig, InstructionParser, RunController, Subscription};
        use std::sync::Arc;
        use std::time::Duration;
        use taskpilot_core::{Action, CommandError, Event, RunStatus, StepOutcome, StepStatus};

        struct Harness {
            controller: RunController,
            script: Arc<PageScript>,
            _bridge: EventBridge,
        }

        fn harness() -> Harness {
            let script = PageScript::new();
            let bridge = EventBridge::spawn(Arc::new(BroadcastHub::new(256)));
            let config = EngineConfig {
                pause_poll_interval_ms: 5,
                simulation_step_interval_ms: 5,
                ..EngineConfig::default()
            };
            let executor = ActionExecutor::new(config.clone(), Arc::new(Extractor::heuristic()));
            let controller = RunController::new(
                config,
                InstructionParser::new(),
                executor,
                Arc::new(ScriptedConnector::new(script.clone())),
                bridge.sink(),
            );
            Harness {
                controller,
                script,
                _bridge: bridge,
            }
        }

        async fn next(sub: &mut Subscription) -> Event {
            tokio::time::timeout(Duration::from_secs(5), sub.recv())
                .await
                .expect("event within timeout")
                .expect("subscription open")
        }

        fn is_status(event: &Event, expected: RunStatus) -> bool {
            matches!(event, Event::StatusChanged { status, .. } if *status == expected)
        }

        async fn until_status(sub: &mut Subscription, expected: RunStatus) -> Vec<Event> {
            let mut events = Vec::new();
            loop {
                let event = next(sub).await;
                let done = is_status(&event, expected);
                events.push(event);
                if done {
                    return events;
                }
            }
        }

        fn settle(controller: &RunController) -> RunStatus {
            tokio::task::block_in_place(|| controller.wait_until_settled(Duration::from_secs(5)))
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_navigate_then_click_completes() {
            let h = harness();
            let mut sub = h.controller.subscribe().await.unwrap();
            assert_eq!(next(&mut sub).await, Event::Connected { status: RunStatus::Idle });

            let run_id = h
                .controller
                .start_run(r#"Navigate to example.com; Click the "Login" button"#)
                .unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Completed);

            let events = until_status(&mut sub, RunStatus::Completed).await;
            assert_eq!(events.len(), 4);
            assert_eq!(events[0], Event::status(RunStatus::Running, Some(run_id.clone())));
            match (&events[1], &events[2]) {
                (
                    Event::Step { outcome: first, .. },
                    Event::Step { outcome: second, .. },
                ) => {
                    assert_eq!(first.step, 1);
                    assert_eq!(first.action, Action::navigate("example.com"));
                    assert_eq!(first.status, StepStatus::Succeeded);
                    assert_eq!(second.step, 2);
                    assert_eq!(second.action, Action::click("Login"));
                    assert_eq!(second.status, StepStatus::Warning);
                }
                other => panic!("unexpected events: {:?}", other),
            }

            let locates = h.script.count("locate");
            assert_eq!(locates, click_strategies("Login").len());
            assert_eq!(h.controller.status().current_index, 2);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_unavailable_page_simulates_every_action() {
            let bridge = EventBridge::spawn(Arc::new(BroadcastHub::new(64)));
            let controller = controller(&bridge);
            let mut sub = controller.subscribe().await.unwrap();
            next(&mut sub).await;

            controller
                .start_run(r#"go to example.com; fill "q" with "mice"; submit"#)
                .unwrap();
            let events = until_status(&mut sub, RunStatus::Completed).await;

            let steps: Vec<&StepOutcome> = events
                .iter()
                .filter_map(|e| match e {
                    Event::Step { outcome, .. } => Some(outcome),
                    _ => None,
                })
                .collect();
            assert_eq!(steps.len(), 3);
            assert!(steps[0].message.starts_with("Simulated: Navigate to example.com"));
            assert!(steps
                .iter()
                .all(|s| s.data == Some(serde_json::json!({ "simulated": true }))));
            assert!(!events.iter().any(|e| matches!(e, Event::Error { .. })));
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_pause_after_three_resumes_at_fourth() {
            let h = harness();
            let gate = h.script.gate_navigation();
            h.controller
                .start_run("go to a.test; go to b.test; go to c.test; go to d.test; go to e.test")
                .unwrap();

            gate.send(()).unwrap();
            gate.send(()).unwrap();
            assert!(eventually(|| h.script.count("navigate") == 3).await);

            h.controller.pause().unwrap();
            gate.send(()).unwrap();
            assert!(eventually(|| h.controller.status().current_index == 3).await);

            tokio::time::sleep(Duration::from_millis(50)).await;
            let snapshot = h.controller.status();
            assert_eq!(snapshot.status, RunStatus::Paused);
            assert_eq!(snapshot.current_index, 3);
            assert_eq!(h.script.count("navigate"), 3);

            h.controller.resume().unwrap();
            gate.send(()).unwrap();
            gate.send(()).unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Completed);

            let navigations: Vec<String> = h
                .script
                .calls()
                .into_iter()
                .filter(|c| c.starts_with("navigate:"))
                .collect();
            assert_eq!(navigations[3], "navigate:https://d.test");
            assert_eq!(navigations.len(), 5);
            let steps: Vec<usize> = h.controller.results().iter().map(|o| o.step).collect();
            assert_eq!(steps, vec![1, 2, 3, 4, 5]);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_start_while_active_is_busy() {
            let h = harness();
            let gate = h.script.gate_navigation();
            h.controller.start_run("go to a.test; go to b.test").unwrap();
            assert!(eventually(|| h.script.count("navigate") == 1).await);

            assert_eq!(
                h.controller.start_run("go to c.test"),
                Err(CommandError::Busy(RunStatus::Running))
            );
            h.controller.pause().unwrap();
            assert_eq!(
                h.controller.start_run("go to c.test"),
                Err(CommandError::Busy(RunStatus::Paused))
            );
            assert_eq!(h.controller.status().current_index, 0);

            h.controller.resume().unwrap();
            gate.send(()).unwrap();
            gate.send(()).unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Completed);
            h.controller.start_run("go to c.test").unwrap();
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_pause_then_resume_keeps_progress() {
            let h = harness();
            let gate = h.script.gate_navigation();
            h.controller.start_run("go to a.test; go to b.test").unwrap();
            assert!(eventually(|| h.script.count("navigate") == 1).await);

            let before = h.controller.status();
            h.controller.pause().unwrap();
            h.controller.resume().unwrap();
            let after = h.controller.status();
            assert_eq!(before.current_index, after.current_index);
            assert_eq!(after.steps_completed, 0);
            assert!(h.controller.results().is_empty());

            gate.send(()).unwrap();
            gate.send(()).unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Completed);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_stop_discards_rest_and_is_idempotent() {
            let h = harness();
            let mut sub = h.controller.subscribe().await.unwrap();
            next(&mut sub).await;

            let gate = h.script.gate_navigation();
            let run_id = h
                .controller
                .start_run("go to a.test; go to b.test; go to c.test")
                .unwrap();
            assert!(eventually(|| h.script.count("navigate") == 1).await);

            h.controller.stop();
            h.controller.stop();
            assert_eq!(h.controller.status().status, RunStatus::Stopping);
            gate.send(()).unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Idle);
            h.controller.stop();

            let events = until_status(&mut sub, RunStatus::Idle).await;
            assert_eq!(
                events,
                vec![
                    Event::status(RunStatus::Running, Some(run_id.clone())),
                    Event::status(RunStatus::Stopping, Some(run_id.clone())),
                    Event::status(RunStatus::Idle, Some(run_id)),
                ]
            );
            assert_eq!(h.script.count("navigate"), 1);
            assert_eq!(h.controller.results().len(), 1);

            drop(gate);
            let next_run = h.controller.start_run("wait 0 seconds").unwrap();
            assert_eq!(
                next(&mut sub).await,
                Event::status(RunStatus::Running, Some(next_run))
            );
            assert_eq!(h.controller.metrics().snapshot().runs_stopped, 1);
        }

        fn status_events(events: &[Event]) -> Vec<RunStatus> {
            events
                .iter()
                .filter_map(|e| match e {
                    Event::StatusChanged { status, .. } => Some(*status),
                    _ => None,
                })
                .collect()
        }

        fn steps_after(events: &[Event], status: RunStatus) -> usize {
            events
                .iter()
                .skip_while(|e| !is_status(e, status))
                .filter(|e| matches!(e, Event::Step { .. }))
                .count()
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_stop_while_paused_settles_idle() {
            let h = harness();
            let mut sub = h.controller.subscribe().await.unwrap();
            next(&mut sub).await;

            let gate = h.script.gate_navigation();
            h.controller
                .start_run("go to a.test; go to b.test; go to c.test")
                .unwrap();
            assert!(eventually(|| h.script.count("navigate") == 1).await);
            h.controller.pause().unwrap();
            gate.send(()).unwrap();
            assert!(eventually(|| h.controller.status().current_index == 1).await);
            assert_eq!(h.controller.status().status, RunStatus::Paused);

            h.controller.stop();
            assert_eq!(settle(&h.controller), RunStatus::Idle);

            let events = until_status(&mut sub, RunStatus::Idle).await;
            assert_eq!(
                status_events(&events),
                vec![
                    RunStatus::Running,
                    RunStatus::Paused,
                    RunStatus::Stopping,
                    RunStatus::Idle,
                ]
            );
            assert_eq!(steps_after(&events, RunStatus::Stopping), 0);
            assert_eq!(h.script.count("navigate"), 1);
            assert_eq!(h.script.open_pages(), 0);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_stop_interrupts_simulated_step() {
            let bridge = EventBridge::spawn(Arc::new(BroadcastHub::new(64)));
            let controller = simulating(&bridge, 60_000);
            let mut sub = controller.subscribe().await.unwrap();
            next(&mut sub).await;

            controller.start_run("go to a.test; go to b.test").unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            controller.stop();
            assert_eq!(settle(&controller), RunStatus::Idle);

            let events = until_status(&mut sub, RunStatus::Idle).await;
            assert_eq!(
                status_events(&events),
                vec![RunStatus::Running, RunStatus::Stopping, RunStatus::Idle]
            );
            assert!(!events.iter().any(|e| matches!(e, Event::Step { .. })));
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_stop_interrupts_long_wait() {
            let h = harness();
            h.controller.start_run("wait 600 seconds; go to a.test").unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;

            h.controller.stop();
            assert_eq!(settle(&h.controller), RunStatus::Idle);
            assert_eq!(h.script.count("navigate"), 0);
            assert_eq!(h.script.open_pages(), 0);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_page_closed_before_run_settles() {
            let h = harness();
            h.script.slow_close(Duration::from_millis(100));

            h.controller.start_run("go to a.test").unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Completed);
            assert_eq!(h.script.open_pages(), 0);

            h.controller.start_run("go to b.test").unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Completed);
            assert_eq!(h.script.open_pages(), 0);
            assert_eq!(h.script.max_open_pages(), 1);
            assert_eq!(h.script.count("close"), 2);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_page_closed_before_stop_or_failure_settles() {
            let h = harness();
            h.script.slow_close(Duration::from_millis(100));

            let gate = h.script.gate_navigation();
            h.controller.start_run("go to a.test; go to b.test").unwrap();
            assert!(eventually(|| h.script.count("navigate") == 1).await);
            h.controller.stop();
            gate.send(()).unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Idle);
            assert_eq!(h.script.open_pages(), 0);
            drop(gate);

            h.script
                .fail("navigate", PageError::SessionLost("browser closed".into()));
            h.controller.start_run("go to c.test").unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Error);
            assert_eq!(h.script.open_pages(), 0);
            assert_eq!(h.script.max_open_pages(), 1);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_stop_resets_finished_run_once() {
            let h = harness();
            h.controller.start_run("wait 0 seconds").unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Completed);

            let mut sub = h.controller.subscribe().await.unwrap();
            assert_eq!(
                next(&mut sub).await,
                Event::Connected { status: RunStatus::Completed }
            );
            h.controller.stop();
            h.controller.stop();
            assert!(is_status(&next(&mut sub).await, RunStatus::Idle));
            assert_eq!(h.controller.status().status, RunStatus::Idle);

            let run_id = h.controller.start_run("wait 0 seconds").unwrap();
            assert_eq!(
                next(&mut sub).await,
                Event::status(RunStatus::Running, Some(run_id))
            );
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn test_platform_failure_moves_run_to_error() {
            let h = harness();
            h.script.resolve(Locator::css("[id=\"email\"]"));
            h.script
                .fail("fill", PageError::SessionLost("browser closed".into()));
            let mut sub = h.controller.subscribe().await.unwrap();
            next(&mut sub).await;

            let run_id = h
                .controller
                .start_run(r#"fill "email" with "a@b.c"; submit"#)
                .unwrap();
            assert_eq!(settle(&h.controller), RunStatus::Error);

            let events = until_status(&mut sub, RunStatus::Error).await;
            assert_eq!(
                &events[1..],
                &[
                    Event::error(Some(run_id.clone()), "Page session lost: browser closed"),
                    Event::status(RunStatus::Error, Some(run_id)),
                ]
            );
            let snapshot = h.controller.status();
            assert_eq!(snapshot.error.as_deref(), Some("Page session lost: browser closed"));
            assert_eq!(snapshot.current_index, 0);
            assert_eq!(h.controller.metrics().snapshot().runs_failed, 1);

            assert!(h.controller.start_run("wait 0 seconds").is_ok());
        }
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id(&RunId::new("0123456789")), "01234567");
        assert_eq!(short_id(&RunId::new("abc")), "abc");
    }
}
