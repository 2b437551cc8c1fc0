//! Typed actions derived from a task instruction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One unit of intended interaction with the execution surface.
///
/// Produced by the instruction parser and never mutated afterwards; the
/// position of an action inside its run is fixed at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Navigate {
        url: String,
    },
    Search {
        query: String,
    },
    Fill {
        field: String,
        value: String,
    },
    Click {
        element_label: String,
    },
    Wait {
        duration_seconds: f64,
    },
    Submit {},
}

impl Action {
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::Navigate { url: url.into() }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self::Search {
            query: query.into(),
        }
    }

    pub fn fill(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Fill {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn click(element_label: impl Into<String>) -> Self {
        Self::Click {
            element_label: element_label.into(),
        }
    }

    pub fn wait(duration_seconds: f64) -> Self {
        Self::Wait { duration_seconds }
    }

    pub fn submit() -> Self {
        Self::Submit {}
    }

    /// Requested suspension for `Wait` actions. Negative or non-finite
    /// durations collapse to zero.
    pub fn wait_duration(&self) -> Option<Duration> {
        match self {
            Self::Wait { duration_seconds } => Some(
                Duration::try_from_secs_f64(*duration_seconds).unwrap_or(Duration::ZERO),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate { url } => write!(f, "Navigate to {url}"),
            Self::Search { query } => write!(f, "Search for \"{query}\""),
            Self::Fill { field, value } => write!(f, "Fill \"{field}\" with \"{value}\""),
            Self::Click { element_label } => write!(f, "Click \"{element_label}\""),
            Self::Wait { duration_seconds } => write!(f, "Wait {duration_seconds}s"),
            Self::Submit {} => f.write_str("Submit"),
        }
    }
}
