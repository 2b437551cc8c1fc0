//! TaskPilot Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Browsers or other execution surfaces
//! - Network/HTTP
//! - Runtime specifics
//!
//! Everything a run produces or consumes is described here: the typed
//! [`Action`] records the parser emits, the [`StepOutcome`] each executed
//! action yields, the [`Event`] stream observers receive and the
//! [`TaskRun`] record the controller owns.

pub mod action;
pub mod error;
pub mod event;
pub mod ids;
pub mod outcome;
pub mod run;
pub mod status;

// Re-export commonly used types
pub use action::Action;
pub use error::{CommandError, CoreError};
pub use event::Event;
pub use ids::{RunId, SubscriberId};
pub use outcome::{Snapshot, StepOutcome};
pub use run::{RunSnapshot, TaskRun};
pub use status::{RunStatus, StepStatus};
