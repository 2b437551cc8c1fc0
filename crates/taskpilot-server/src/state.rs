//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use taskpilot_core::RunStatus;
use taskpilot_engine::{
    ActionExecutor, BroadcastHub, EngineMetrics, EventBridge, Extractor, InstructionParser,
    RunController,
};

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The single run controller of this process.
    pub controller: RunController,

    /// Fan-out point of the event stream.
    pub hub: Arc<BroadcastHub>,

    /// Counters shared with the controller.
    pub metrics: Arc<EngineMetrics>,

    /// Extraction backend actually in use (after key checks).
    pub extraction_backend: &'static str,

    /// Drain task feeding the hub. Taken on shutdown.
    bridge: Mutex<Option<EventBridge>>,
}

impl AppState {
    /// Wire the engine together. Must be called inside a Tokio runtime.
    pub fn new(config: &Config) -> Arc<Self> {
        let hub = Arc::new(BroadcastHub::new(config.engine.subscriber_buffer));
        let bridge = EventBridge::spawn(hub.clone());

        let extractor = Arc::new(Extractor::new(&config.extraction_provider));
        let extraction_backend = extractor.backend();
        let executor = ActionExecutor::new(config.engine.clone(), extractor);

        let controller = RunController::new(
            config.engine.clone(),
            InstructionParser::new(),
            executor,
            Arc::from(config.page_provider.connector()),
            bridge.sink(),
        );
        let metrics = controller.metrics();

        info!(
            page_backend = %controller.page_backend(),
            extraction_backend = %extraction_backend,
            "Engine initialized"
        );

        Arc::new(Self {
            controller,
            hub,
            metrics,
            extraction_backend,
            bridge: Mutex::new(Some(bridge)),
        })
    }

    /// Stop any active run, wait for it to settle and flush pending events.
    pub async fn shutdown(self: &Arc<Self>, timeout: Duration) {
        self.controller.stop();

        let state = self.clone();
        let settled = tokio::task::spawn_blocking(move || state.controller.wait_until_settled(timeout))
            .await
            .unwrap_or(RunStatus::Error);
        if settled.is_active() {
            warn!(status = %settled, "Run did not settle before shutdown");
        }

        if let Some(bridge) = self.bridge.lock().await.take() {
            bridge.shutdown().await;
        }
        info!("Engine shut down");
    }
}
