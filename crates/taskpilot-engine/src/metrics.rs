//! Run and step counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use taskpilot_core::StepStatus;

/// Process-lifetime counters updated by the worker.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    runs_stopped: AtomicU64,
    runs_simulated: AtomicU64,
    steps_succeeded: AtomicU64,
    steps_warning: AtomicU64,
    steps_failed: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub runs_stopped: u64,
    pub runs_simulated: u64,
    pub steps_succeeded: u64,
    pub steps_warning: u64,
    pub steps_failed: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn run_stopped(&self) {
        self.runs_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn run_simulated(&self) {
        self.runs_simulated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn step(&self, status: StepStatus) {
        let counter = match status {
            StepStatus::Succeeded => &self.steps_succeeded,
            StepStatus::Warning => &self.steps_warning,
            StepStatus::Failed => &self.steps_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_stopped: self.runs_stopped.load(Ordering::Relaxed),
            runs_simulated: self.runs_simulated.load(Ordering::Relaxed),
            steps_succeeded: self.steps_succeeded.load(Ordering::Relaxed),
            steps_warning: self.steps_warning.load(Ordering::Relaxed),
            steps_failed: self.steps_failed.load(Ordering::Relaxed),
        }
    }
}
