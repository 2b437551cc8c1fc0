//! HTTP request handlers.

mod agent;
mod health;
mod stream;

pub use agent::{agent_results, agent_status, pause_agent, resume_agent, start_agent, stop_agent};
pub use health::{health_check, metrics_handler};
pub use stream::agent_stream;
