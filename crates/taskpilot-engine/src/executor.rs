//! Performs one action against a page.
//!
//! Element-targeting actions walk a ranked strategy list. Exhausting the
//! list is a warning, a page error on one action is a failed step, and only
//! a platform failure (the page itself is gone) escapes to the caller.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use taskpilot_core::{Action, Snapshot, StepOutcome, StepStatus};

use crate::config::EngineConfig;
use crate::extract::Extractor;
use crate::page::{ElementHandle, PageCapability, PageError};
use crate::strategy::{
    click_strategies, fill_strategies, search_input_strategies, submit_strategies,
    LocatorStrategy,
};

/// The page became unusable; the run cannot continue.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct PlatformFailure(pub PageError);

/// Blocking sleep used by wait actions. Returns false when the sleep was cut
/// short.
pub type Sleeper = Arc<dyn Fn(Duration) -> bool + Send + Sync>;

/// State carried between the steps of one run.
#[derive(Clone, Default)]
pub struct StepContext {
    /// Instruction text, used as the extraction request.
    pub task: String,
    /// Most recently filled input, the target of Enter when a submit control
    /// cannot be found.
    pub last_input: Option<ElementHandle>,
    /// Replaces `thread::sleep` for wait actions.
    pub sleeper: Option<Sleeper>,
}

impl StepContext {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    fn sleep(&self, duration: Duration) -> bool {
        match &self.sleeper {
            Some(sleeper) => sleeper(duration),
            None => {
                thread::sleep(duration);
                true
            }
        }
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("task", &self.task)
            .field("last_input", &self.last_input)
            .field("sleeper", &self.sleeper.is_some())
            .finish()
    }
}

struct Performed {
    status: StepStatus,
    message: String,
    data: Value,
}

impl Performed {
    fn new(status: StepStatus, message: impl Into<String>, data: Value) -> Self {
        Self {
            status,
            message: message.into(),
            data,
        }
    }
}

struct Resolved {
    strategy: &'static str,
    attempts: usize,
    element: ElementHandle,
}

impl Resolved {
    fn data(&self) -> Value {
        json!({ "strategy": self.strategy, "attempts": self.attempts })
    }
}

pub struct ActionExecutor {
    config: EngineConfig,
    extractor: Arc<Extractor>,
}

impl ActionExecutor {
    pub fn new(config: EngineConfig, extractor: Arc<Extractor>) -> Self {
        Self { config, extractor }
    }

    /// Execute `action` as step `step` and capture a snapshot afterwards.
    pub fn execute(
        &self,
        step: usize,
        action: &Action,
        page: &dyn PageCapability,
        ctx: &mut StepContext,
    ) -> Result<StepOutcome, PlatformFailure> {
        let performed = match self.perform(action, page, ctx) {
            Ok(performed) => performed,
            Err(e) if e.is_platform_failure() => return Err(PlatformFailure(e)),
            Err(e) => {
                warn!(step, action = %action, error = %e, "Action failed");
                Performed::new(StepStatus::Failed, format!("{} failed: {}", action, e), Value::Null)
            }
        };

        let snapshot = match page.snapshot() {
            Ok(png) => Some(Snapshot::new(png)),
            Err(e) if e.is_platform_failure() => return Err(PlatformFailure(e)),
            Err(e) => {
                warn!(step, error = %e, "Snapshot capture failed");
                None
            }
        };

        let outcome = match performed.status {
            StepStatus::Succeeded => StepOutcome::succeeded(step, action.clone(), performed.message),
            StepStatus::Warning => StepOutcome::warning(step, action.clone(), performed.message),
            StepStatus::Failed => StepOutcome::failed(step, action.clone(), performed.message),
        };
        let outcome = outcome.with_snapshot(snapshot);
        Ok(match performed.data {
            Value::Null => outcome,
            data => outcome.with_data(data),
        })
    }

    fn perform(
        &self,
        action: &Action,
        page: &dyn PageCapability,
        ctx: &mut StepContext,
    ) -> Result<Performed, PageError> {
        match action {
            Action::Navigate { url } => self.navigate(url, page, ctx),
            Action::Search { query } => {
                let resolved = self.resolve(&search_input_strategies(), page, |el| {
                    page.fill(el, query)?;
                    page.press_enter(el)
                })?;
                Ok(match resolved {
                    Ok(r) => {
                        let data = r.data();
                        ctx.last_input = Some(r.element);
                        Performed::new(StepStatus::Succeeded, format!("Searched for \"{}\"", query), data)
                    }
                    Err(attempts) => Performed::new(
                        StepStatus::Warning,
                        format!("No search box found for \"{}\"", query),
                        json!({ "attempts": attempts }),
                    ),
                })
            }
            Action::Fill { field, value } => {
                let resolved = self.resolve(&fill_strategies(field), page, |el| page.fill(el, value))?;
                Ok(match resolved {
                    Ok(r) => {
                        let data = r.data();
                        ctx.last_input = Some(r.element);
                        Performed::new(StepStatus::Succeeded, format!("Filled \"{}\"", field), data)
                    }
                    Err(attempts) => Performed::new(
                        StepStatus::Warning,
                        format!("Could not find field \"{}\"", field),
                        json!({ "attempts": attempts }),
                    ),
                })
            }
            Action::Click { element_label } => {
                let resolved =
                    self.resolve(&click_strategies(element_label), page, |el| page.click(el))?;
                Ok(match resolved {
                    Ok(r) => Performed::new(
                        StepStatus::Succeeded,
                        format!("Clicked \"{}\"", element_label),
                        r.data(),
                    ),
                    Err(attempts) => Performed::new(
                        StepStatus::Warning,
                        format!("Could not find element \"{}\"", element_label),
                        json!({ "attempts": attempts }),
                    ),
                })
            }
            Action::Wait { duration_seconds } => {
                if ctx.sleep(action.wait_duration().unwrap_or_default()) {
                    Ok(Performed::new(
                        StepStatus::Succeeded,
                        format!("Waited {}s", duration_seconds),
                        Value::Null,
                    ))
                } else {
                    Ok(Performed::new(
                        StepStatus::Warning,
                        format!("Wait of {}s interrupted", duration_seconds),
                        Value::Null,
                    ))
                }
            }
            Action::Submit {} => self.submit(page, ctx),
        }
    }

    fn navigate(
        &self,
        url: &str,
        page: &dyn PageCapability,
        ctx: &mut StepContext,
    ) -> Result<Performed, PageError> {
        let target = normalize_url(url);
        let final_url = page.navigate(&target)?;
        ctx.last_input = None;

        let title = tolerate(page.title())?;
        let mut data = json!({ "url": final_url, "title": title });

        if self.config.extract_after_navigate {
            let content = tolerate(page.content())?;
            if !content.is_empty() {
                let extracted = self.extractor.extract(&final_url, &content, &ctx.task);
                data["extracted"] = Value::Object(extracted);
            }
        }

        Ok(Performed::new(
            StepStatus::Succeeded,
            format!("Navigated to {}", final_url),
            data,
        ))
    }

    fn submit(&self, page: &dyn PageCapability, ctx: &mut StepContext) -> Result<Performed, PageError> {
        let attempts = match self.resolve(&submit_strategies(), page, |el| page.click(el))? {
            Ok(r) => return Ok(Performed::new(StepStatus::Succeeded, "Submitted form", r.data())),
            Err(attempts) => attempts,
        };

        let Some(input) = ctx.last_input.clone() else {
            return Ok(Performed::new(
                StepStatus::Warning,
                "No submit control found",
                json!({ "attempts": attempts }),
            ));
        };

        match page.press_enter(&input) {
            Ok(()) => Ok(Performed::new(
                StepStatus::Succeeded,
                "Submitted by pressing Enter",
                json!({ "strategy": "enter-key", "attempts": attempts + 1 }),
            )),
            Err(e) if e.is_platform_failure() => Err(e),
            Err(e) => Ok(Performed::new(
                StepStatus::Warning,
                format!("No submit control found and Enter failed: {}", e),
                json!({ "attempts": attempts + 1 }),
            )),
        }
    }

    /// Try `strategies` in order. The first one that locates an element and
    /// for which `op` succeeds wins. `Err` in the inner result carries the
    /// number of strategies tried when none worked.
    fn resolve<F>(
        &self,
        strategies: &[LocatorStrategy],
        page: &dyn PageCapability,
        mut op: F,
    ) -> Result<Result<Resolved, usize>, PageError>
    where
        F: FnMut(&ElementHandle) -> Result<(), PageError>,
    {
        let timeout = self.config.strategy_timeout();
        for (idx, strategy) in strategies.iter().enumerate() {
            let element = match page.locate(&strategy.locator, timeout) {
                Ok(Some(element)) => element,
                Ok(None) => continue,
                Err(e) if e.is_platform_failure() => return Err(e),
                Err(e) => {
                    debug!(strategy = strategy.name, locator = %strategy.locator, error = %e, "Locate failed");
                    continue;
                }
            };
            match op(&element) {
                Ok(()) => {
                    debug!(strategy = strategy.name, attempts = idx + 1, "Strategy succeeded");
                    return Ok(Ok(Resolved {
                        strategy: strategy.name,
                        attempts: idx + 1,
                        element,
                    }));
                }
                Err(e) if e.is_platform_failure() => return Err(e),
                Err(e) => {
                    debug!(strategy = strategy.name, error = %e, "Strategy operation failed");
                }
            }
        }
        Ok(Err(strategies.len()))
    }
}

/// Keep a platform failure, degrade any other error to the default value.
fn tolerate<T: Default>(result: Result<T, PageError>) -> Result<T, PageError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_platform_failure() => Err(e),
        Err(e) => {
            debug!(error = %e, "Ignoring page read failure");
            Ok(T::default())
        }
    }
}

/// Add a scheme to bare hosts such as `example.com`.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let has_scheme = url.contains("://")
        || ["about:", "data:", "file:"]
            .iter()
            .any(|scheme| url.starts_with(scheme));
    if has_scheme {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
