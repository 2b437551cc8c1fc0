//! Per-step results.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::action::Action;
use crate::status::StepStatus;

/// A PNG capture of the execution surface taken after an action.
///
/// Serialized as a `data:image/png;base64,...` URL so observers can render
/// it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub png: Vec<u8>,
}

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

impl Snapshot {
    pub fn new(png: Vec<u8>) -> Self {
        Self { png }
    }

    pub fn to_data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&self.png))
    }

    pub fn from_data_url(url: &str) -> Option<Self> {
        let encoded = url.strip_prefix(DATA_URL_PREFIX)?;
        STANDARD.decode(encoded).ok().map(Self::new)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let url = String::deserialize(deserializer)?;
        Self::from_data_url(&url)
            .ok_or_else(|| serde::de::Error::custom("expected a base64 PNG data URL"))
    }
}

/// The recorded result of attempting one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// 1-based position of the action in the run's action list.
    pub step: usize,
    pub action: Action,
    pub status: StepStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub finished_at: DateTime<Utc>,
}

impl StepOutcome {
    fn new(step: usize, action: Action, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step,
            action,
            status,
            message: message.into(),
            snapshot: None,
            data: None,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(step: usize, action: Action, message: impl Into<String>) -> Self {
        Self::new(step, action, StepStatus::Succeeded, message)
    }

    pub fn warning(step: usize, action: Action, message: impl Into<String>) -> Self {
        Self::new(step, action, StepStatus::Warning, message)
    }

    pub fn failed(step: usize, action: Action, message: impl Into<String>) -> Self {
        Self::new(step, action, StepStatus::Failed, message)
    }

    pub fn with_snapshot(mut self, snapshot: Option<Snapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
