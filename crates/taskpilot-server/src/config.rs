//! Server configuration.

use thiserror::Error;

use taskpilot_engine::{EngineConfig, ExtractionProvider, PageProvider};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Unknown page provider '{0}' (expected 'none' or 'webdriver')")]
    UnknownPageProvider(String),

    #[error("Unknown extraction provider '{0}' (expected 'heuristic', 'openai', 'anthropic' or 'gemini')")]
    UnknownExtractionProvider(String),
}

/// API keys for the language-model vendors.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub google: Option<String>,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub http_addr: String,

    /// Page backend used by runs.
    pub page_provider: PageProvider,

    /// Extraction backend used after navigation.
    pub extraction_provider: ExtractionProvider,

    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8000".to_string(),
            page_provider: PageProvider::None,
            extraction_provider: ExtractionProvider::Heuristic,
            engine: EngineConfig::default(),
        }
    }
}

/// Resolve a page provider by name.
pub fn page_provider(
    name: &str,
    webdriver_url: &str,
    headless: bool,
) -> Result<PageProvider, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "none" | "simulation" | "" => Ok(PageProvider::None),
        "webdriver" => Ok(PageProvider::WebDriver {
            endpoint: webdriver_url.to_string(),
            headless,
        }),
        other => Err(ConfigError::UnknownPageProvider(other.to_string())),
    }
}

/// Resolve an extraction provider by name, picking the matching API key.
pub fn extraction_provider(
    name: &str,
    model: Option<String>,
    base_url: Option<String>,
    keys: ApiKeys,
) -> Result<ExtractionProvider, ConfigError> {
    let key = match name.trim().to_ascii_lowercase().as_str() {
        "openai" => keys.openai,
        "anthropic" => keys.anthropic,
        "gemini" => keys.google,
        _ => None,
    };
    ExtractionProvider::from_name(name, key, model, base_url)
        .ok_or_else(|| ConfigError::UnknownExtractionProvider(name.to_string()))
}
