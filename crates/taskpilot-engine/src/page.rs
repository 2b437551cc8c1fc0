//! Page capability: the narrow surface the executor drives.
//!
//! A page is used from the worker thread only, so the trait is synchronous
//! and blocking. Connectors produce pages and are selected once, at
//! construction, from a [`PageProvider`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::webdriver::WebDriverConnector;

/// Errors from page operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PageError {
    #[error("Page unavailable: {0}")]
    Unavailable(String),

    #[error("Page session lost: {0}")]
    SessionLost(String),

    #[error("Element not found")]
    NotFound,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Page operation failed: {0}")]
    Operation(String),

    #[error("Unsupported page operation: {0}")]
    Unsupported(&'static str),
}

impl PageError {
    /// Whether the page itself is unusable, as opposed to one operation
    /// failing on an otherwise healthy page.
    pub fn is_platform_failure(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::SessionLost(_))
    }
}

/// A selector understood by the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={}", s),
            Self::XPath(s) => write!(f, "xpath={}", s),
        }
    }
}

/// Opaque reference to a located element, valid for the page that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// A controllable page.
pub trait PageCapability: Send {
    /// Load `url` and return the final resolved URL once content is loaded.
    fn navigate(&self, url: &str) -> Result<String, PageError>;

    /// Resolve `locator` to an element, waiting at most `timeout`.
    /// `Ok(None)` means the selector matched nothing in time.
    fn locate(&self, locator: &Locator, timeout: Duration)
        -> Result<Option<ElementHandle>, PageError>;

    fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), PageError>;

    fn click(&self, element: &ElementHandle) -> Result<(), PageError>;

    /// Send the Enter key to `element`.
    fn press_enter(&self, element: &ElementHandle) -> Result<(), PageError>;

    /// PNG bytes of the current viewport.
    fn snapshot(&self) -> Result<Vec<u8>, PageError>;

    fn title(&self) -> Result<String, PageError>;

    /// Current document markup.
    fn content(&self) -> Result<String, PageError>;

    fn current_url(&self) -> Result<String, PageError>;

    /// Release the page. Called once when the run ends.
    fn close(&self) -> Result<(), PageError> {
        Ok(())
    }
}

/// Produces pages for runs.
pub trait PageConnector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a page. Called on the worker thread at run start; an error
    /// switches the run to simulation.
    fn connect(&self) -> Result<Box<dyn PageCapability>, PageError>;
}

/// The closed set of page backends.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PageProvider {
    /// No execution surface; every run is simulated.
    #[default]
    None,
    /// A W3C WebDriver endpoint (chromedriver, geckodriver, selenium).
    WebDriver { endpoint: String, headless: bool },
}

impl PageProvider {
    pub fn connector(&self) -> Box<dyn PageConnector> {
        match self {
            Self::None => Box::new(UnavailableConnector),
            Self::WebDriver { endpoint, headless } => {
                Box::new(WebDriverConnector::new(endpoint.clone(), *headless))
            }
        }
    }
}

/// Connector for deployments without a page backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableConnector;

impl PageConnector for UnavailableConnector {
    fn name(&self) -> &'static str {
        "none"
    }

    fn connect(&self) -> Result<Box<dyn PageCapability>, PageError> {
        Err(PageError::Unavailable(
            "no page provider configured".to_string(),
        ))
    }
}
