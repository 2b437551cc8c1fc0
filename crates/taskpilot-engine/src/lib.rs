//! TaskPilot Engine
//!
//! Turns a natural-language instruction into typed actions and drives them
//! against a page capability on a dedicated worker thread, while live
//! observers receive the ordered event stream through the broadcast hub.
//!
//! Data flow:
//! - [`parser::InstructionParser`] converts text into [`taskpilot_core::Action`]s.
//! - [`controller::RunController`] owns the run state machine and the worker.
//! - [`executor::ActionExecutor`] performs one action with ranked locator strategies.
//! - [`bridge::EventBridge`] marshals worker events onto the async side.
//! - [`hub::BroadcastHub`] fans events out to subscribers.

pub mod bridge;
pub mod config;
pub mod controller;
pub mod executor;
pub mod extract;
pub mod hub;
pub mod metrics;
pub mod page;
pub mod parser;
pub mod strategy;
pub mod webdriver;
mod worker;

#[cfg(test)]
mod testing;

pub use bridge::{EventBridge, EventSink};
pub use config::EngineConfig;
pub use controller::{RunController, RunOptions};
pub use executor::{ActionExecutor, PlatformFailure, Sleeper, StepContext};
pub use extract::{ExtractionCapability, ExtractionError, ExtractionProvider, Extractor};
pub use hub::{BroadcastHub, Subscription};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use page::{ElementHandle, Locator, PageCapability, PageConnector, PageError, PageProvider};
pub use parser::InstructionParser;
