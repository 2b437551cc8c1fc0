//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the run controller and action executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout handed to the page for each locator strategy attempt.
    pub strategy_timeout_ms: u64,

    /// Re-check interval of a paused worker.
    pub pause_poll_interval_ms: u64,

    /// Cadence of simulated steps when no page is available.
    pub simulation_step_interval_ms: u64,

    /// Events buffered per subscriber before it is considered stalled.
    pub subscriber_buffer: usize,

    /// Run content extraction after every successful navigation.
    pub extract_after_navigate: bool,

    /// Parsed actions beyond this count are dropped.
    pub max_actions: usize,
}

impl EngineConfig {
    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }

    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms.max(1))
    }

    pub fn simulation_step_interval(&self) -> Duration {
        Duration::from_millis(self.simulation_step_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy_timeout_ms: 3_000,
            pause_poll_interval_ms: 500,
            simulation_step_interval_ms: 1_000,
            subscriber_buffer: 256,
            extract_after_navigate: true,
            max_actions: 50,
        }
    }
}
