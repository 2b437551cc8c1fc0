//! Language-model extraction over the vendors' HTTP APIs.

use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::heuristic::PageText;
use super::{Extracted, ExtractionCapability, ExtractionError};

const MAX_CONTENT_CHARS: usize = 8_000;
const MAX_FALLBACK_CHARS: usize = 500;
const MAX_LINE_CHARS: usize = 200;
const MAX_TOKENS: u32 = 1_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmVendor {
    OpenAi,
    Anthropic,
    Gemini,
}

impl LlmVendor {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::Gemini => "gemini-1.5-flash",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }
}

/// Sends page text and the user's request to a chat model and parses the
/// reply into structured data.
pub struct LlmExtractor {
    vendor: LlmVendor,
    api_key: String,
    model: String,
    base_url: String,
    text: PageText,
    json_object: Regex,
}

impl LlmExtractor {
    pub fn new(
        vendor: LlmVendor,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<String>,
    ) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| vendor.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            vendor,
            api_key: api_key.into(),
            model: model.into(),
            base_url,
            text: PageText::new(),
            json_object: Regex::new(r"(?s)\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}")
                .expect("built-in JSON pattern is valid"),
        }
    }

    fn prompt(&self, url: &str, content: &str, request: &str) -> String {
        let text = truncate_chars(&self.text.visible(content), MAX_CONTENT_CHARS);
        format!(
            "You are a web scraping assistant. Extract structured information from the \
             following webpage based on the user's request.\n\n\
             URL: {url}\nUser Request: {request}\n\nWebpage Content:\n{text}\n\n\
             Instructions:\n\
             1. Extract the information requested by the user\n\
             2. Return the data as a valid JSON object\n\
             3. Use descriptive field names\n\
             4. If information is not found, use null values\n\n\
             For form-related pages, also identify form fields and their types, \
             required vs optional fields, and the form action and method.\n\n\
             Return only the JSON object, no additional text."
        )
    }

    fn request(&self, prompt: &str) -> Result<String, ExtractionError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        let request = match self.vendor {
            LlmVendor::OpenAi => client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": MAX_TOKENS,
                    "messages": [{ "role": "user", "content": prompt }],
                })),
            LlmVendor::Anthropic => client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&json!({
                    "model": self.model,
                    "max_tokens": MAX_TOKENS,
                    "messages": [{ "role": "user", "content": prompt }],
                })),
            LlmVendor::Gemini => client
                .post(format!(
                    "{}/v1beta/models/{}:generateContent",
                    self.base_url, self.model
                ))
                .header("x-goog-api-key", &self.api_key)
                .json(&json!({
                    "contents": [{ "parts": [{ "text": prompt }] }],
                })),
        };

        let response = request
            .send()
            .map_err(|e| ExtractionError::Request(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            return Err(ExtractionError::Backend(message));
        }

        reply_text(self.vendor, &body).ok_or(ExtractionError::EmptyResponse)
    }

    /// Turn a model reply into data: an embedded JSON object, the whole
    /// reply as JSON, `key: value` lines, or the leading text.
    pub(crate) fn parse_reply(&self, reply: &str) -> Extracted {
        for candidate in self.json_object.find_iter(reply) {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate.as_str()) {
                if !map.is_empty() {
                    return map;
                }
            }
        }
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(reply.trim()) {
            return map;
        }

        let mut data = Extracted::new();
        for line in reply.lines().map(str::trim) {
            if line.chars().count() >= MAX_LINE_CHARS {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase().replace(' ', "_");
            if key.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            data.insert(key, json!(value));
        }

        if data.is_empty() {
            data.insert(
                "extracted_content".into(),
                json!(truncate_chars(reply, MAX_FALLBACK_CHARS)),
            );
        }
        data
    }
}

impl ExtractionCapability for LlmExtractor {
    fn name(&self) -> &'static str {
        self.vendor.name()
    }

    fn extract(&self, url: &str, content: &str, prompt: &str) -> Result<Extracted, ExtractionError> {
        let reply = self.request(&self.prompt(url, content, prompt))?;
        debug!(vendor = %self.vendor.name(), chars = reply.len(), "Model reply received");
        Ok(self.parse_reply(&reply))
    }
}

fn reply_text(vendor: LlmVendor, body: &Value) -> Option<String> {
    let pointer = match vendor {
        LlmVendor::OpenAi => "/choices/0/message/content",
        LlmVendor::Anthropic => "/content/0/text",
        LlmVendor::Gemini => "/candidates/0/content/parts/0/text",
    };
    body.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
