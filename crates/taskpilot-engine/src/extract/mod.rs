//! Content extraction after navigation.
//!
//! A language-model backend is optional. [`Extractor`] always answers: when
//! the model is absent or fails, the structural heuristics take over.

mod heuristic;
mod llm;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

pub use heuristic::HeuristicExtractor;
pub use llm::{LlmExtractor, LlmVendor};

/// Structured data pulled out of a page.
pub type Extracted = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction request failed: {0}")]
    Request(String),

    #[error("Extraction backend returned an error: {0}")]
    Backend(String),

    #[error("Extraction response was empty")]
    EmptyResponse,
}

/// Something that turns page content into structured data.
pub trait ExtractionCapability: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, url: &str, content: &str, prompt: &str) -> Result<Extracted, ExtractionError>;
}

/// The closed set of extraction backends, chosen once at startup.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtractionProvider {
    #[default]
    Heuristic,
    OpenAi {
        api_key: Option<String>,
        model: String,
        base_url: Option<String>,
    },
    Anthropic {
        api_key: Option<String>,
        model: String,
        base_url: Option<String>,
    },
    Gemini {
        api_key: Option<String>,
        model: String,
        base_url: Option<String>,
    },
}

impl ExtractionProvider {
    /// Resolve a provider by name. Unknown names yield `None`.
    pub fn from_name(
        name: &str,
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Option<Self> {
        let provider = match name.trim().to_ascii_lowercase().as_str() {
            "heuristic" | "none" | "" => Self::Heuristic,
            "openai" => Self::OpenAi {
                api_key,
                model: model.unwrap_or_else(|| LlmVendor::OpenAi.default_model().to_string()),
                base_url,
            },
            "anthropic" => Self::Anthropic {
                api_key,
                model: model.unwrap_or_else(|| LlmVendor::Anthropic.default_model().to_string()),
                base_url,
            },
            "gemini" => Self::Gemini {
                api_key,
                model: model.unwrap_or_else(|| LlmVendor::Gemini.default_model().to_string()),
                base_url,
            },
            _ => return None,
        };
        Some(provider)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::OpenAi { .. } => "openai",
            Self::Anthropic { .. } => "anthropic",
            Self::Gemini { .. } => "gemini",
        }
    }

    /// Build the model-backed capability, if this provider has one and its
    /// key is present.
    fn capability(&self) -> Option<Box<dyn ExtractionCapability>> {
        let (vendor, api_key, model, base_url) = match self {
            Self::Heuristic => return None,
            Self::OpenAi {
                api_key,
                model,
                base_url,
            } => (LlmVendor::OpenAi, api_key, model, base_url),
            Self::Anthropic {
                api_key,
                model,
                base_url,
            } => (LlmVendor::Anthropic, api_key, model, base_url),
            Self::Gemini {
                api_key,
                model,
                base_url,
            } => (LlmVendor::Gemini, api_key, model, base_url),
        };

        match api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Some(Box::new(LlmExtractor::new(
                vendor,
                key,
                model.clone(),
                base_url.clone(),
            ))),
            None => {
                warn!(
                    provider = %self.name(),
                    "No API key configured, using heuristic extraction"
                );
                None
            }
        }
    }
}

/// Extraction front door used by the executor.
pub struct Extractor {
    primary: Option<Box<dyn ExtractionCapability>>,
    fallback: HeuristicExtractor,
}

impl Extractor {
    pub fn new(provider: &ExtractionProvider) -> Self {
        Self {
            primary: provider.capability(),
            fallback: HeuristicExtractor::new(),
        }
    }

    pub fn heuristic() -> Self {
        Self::new(&ExtractionProvider::Heuristic)
    }

    /// Use a custom capability ahead of the heuristics.
    pub fn with_capability(capability: Box<dyn ExtractionCapability>) -> Self {
        Self {
            primary: Some(capability),
            fallback: HeuristicExtractor::new(),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.primary
            .as_ref()
            .map(|p| p.name())
            .unwrap_or_else(|| self.fallback.name())
    }

    /// Extract structured data. Never fails.
    pub fn extract(&self, url: &str, content: &str, prompt: &str) -> Extracted {
        if let Some(primary) = &self.primary {
            match primary.extract(url, content, prompt) {
                Ok(data) if !data.is_empty() => return data,
                Ok(_) => warn!(backend = %primary.name(), "Extraction returned no data"),
                Err(e) => warn!(backend = %primary.name(), error = %e, "Extraction failed"),
            }
        }
        self.fallback.extract_page(url, content)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::heuristic()
    }
}
