//! TaskPilot Server Library
//!
//! HTTP command surface and live WebSocket stream in front of the
//! TaskPilot engine.

pub mod config;
pub mod http;
pub mod metrics;
pub mod state;

pub use config::Config;
pub use http::create_router;
pub use state::AppState;
