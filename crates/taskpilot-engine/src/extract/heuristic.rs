//! Deterministic extraction from page structure.

use std::collections::HashMap;

use regex::Regex;
use serde_json::{json, Value};
use url::Url;

use super::{Extracted, ExtractionCapability, ExtractionError};

const MAX_HEADINGS: usize = 20;
const MAX_PARAGRAPHS: usize = 3;
const MIN_PARAGRAPH_CHARS: usize = 20;
const MAX_LINKS: usize = 10;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in extraction pattern is valid")
}

/// Markup to visible text.
pub(crate) struct PageText {
    hidden: Regex,
    tag: Regex,
    whitespace: Regex,
}

impl PageText {
    pub(crate) fn new() -> Self {
        Self {
            hidden: compile(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<!--.*?-->"),
            tag: compile(r"(?s)<[^>]*>"),
            whitespace: compile(r"\s+"),
        }
    }

    /// Drop scripts, styles and tags, decode common entities and collapse
    /// whitespace.
    pub(crate) fn visible(&self, html: &str) -> String {
        let without_hidden = self.hidden.replace_all(html, " ");
        let without_tags = self.tag.replace_all(&without_hidden, " ");
        let decoded = decode_entities(&without_tags);
        self.whitespace.replace_all(&decoded, " ").trim().to_string()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Title, description, headings, forms, contacts, paragraphs and links.
pub struct HeuristicExtractor {
    text: PageText,
    title: Regex,
    meta_description: Regex,
    heading: Regex,
    form: Regex,
    field: Regex,
    attribute: Regex,
    email: Regex,
    phone: Regex,
    paragraph: Regex,
    link: Regex,
}

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self {
            text: PageText::new(),
            title: compile(r"(?is)<title[^>]*>(.*?)</title>"),
            meta_description: compile(
                r#"(?is)<meta\b[^>]*\bname\s*=\s*["']description["'][^>]*>"#,
            ),
            heading: compile(r"(?is)<h[1-3]\b[^>]*>(.*?)</h[1-3]>"),
            form: compile(r"(?is)<form\b([^>]*)>(.*?)</form>"),
            field: compile(r"(?is)<(?:input|textarea|select)\b([^>]*)>"),
            attribute: compile(
                r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#,
            ),
            email: compile(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
            phone: compile(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"),
            paragraph: compile(r"(?is)<p\b[^>]*>(.*?)</p>"),
            link: compile(r"(?is)<a\b([^>]*)>(.*?)</a>"),
        }
    }

    /// Extract everything recognizable from `html`. Keys are only present
    /// when something was found.
    pub fn extract_page(&self, url: &str, html: &str) -> Extracted {
        let mut data = Extracted::new();

        if let Some(title) = self.first_text(&self.title, html) {
            data.insert("title".into(), json!(title));
        }
        if let Some(description) = self.description(html) {
            data.insert("description".into(), json!(description));
        }

        let headings: Vec<String> = self
            .all_text(&self.heading, html)
            .into_iter()
            .take(MAX_HEADINGS)
            .collect();
        insert_list(&mut data, "headings", headings);

        let forms = self.forms(html);
        if !forms.is_empty() {
            data.insert("forms".into(), Value::Array(forms));
        }

        let visible = self.text.visible(html);
        insert_list(&mut data, "emails", unique(&self.email, &visible));
        insert_list(&mut data, "phones", unique(&self.phone, &visible));

        let paragraphs: Vec<String> = self
            .all_text(&self.paragraph, html)
            .into_iter()
            .filter(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
            .take(MAX_PARAGRAPHS)
            .collect();
        insert_list(&mut data, "content", paragraphs);

        let links = self.links(url, html);
        if !links.is_empty() {
            data.insert("links".into(), Value::Array(links));
        }

        data
    }

    fn first_text(&self, pattern: &Regex, html: &str) -> Option<String> {
        pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| self.text.visible(m.as_str()))
            .filter(|t| !t.is_empty())
    }

    fn all_text(&self, pattern: &Regex, html: &str) -> Vec<String> {
        pattern
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| self.text.visible(m.as_str()))
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn attributes(&self, raw: &str) -> HashMap<String, String> {
        self.attribute
            .captures_iter(raw)
            .filter_map(|c| {
                let name = c.get(1)?.as_str().to_ascii_lowercase();
                let value = c
                    .get(2)
                    .or_else(|| c.get(3))
                    .or_else(|| c.get(4))
                    .map(|m| decode_entities(m.as_str()))
                    .unwrap_or_default();
                Some((name, value))
            })
            .collect()
    }

    fn description(&self, html: &str) -> Option<String> {
        let tag = self.meta_description.find(html)?;
        self.attributes(tag.as_str()).remove("content")
    }

    fn forms(&self, html: &str) -> Vec<Value> {
        self.form
            .captures_iter(html)
            .map(|form| {
                let attrs = form
                    .get(1)
                    .map(|m| self.attributes(m.as_str()))
                    .unwrap_or_default();
                let body = form.get(2).map(|m| m.as_str()).unwrap_or_default();
                let inputs: Vec<Value> = self
                    .field
                    .captures_iter(body)
                    .filter_map(|c| c.get(1))
                    .map(|raw| {
                        let field = self.attributes(raw.as_str());
                        let attr = |name: &str| field.get(name).cloned().unwrap_or_default();
                        json!({
                            "name": attr("name"),
                            "type": field.get("type").cloned().unwrap_or_else(|| "text".into()),
                            "id": attr("id"),
                            "placeholder": attr("placeholder"),
                            "required": field.contains_key("required"),
                        })
                    })
                    .collect();
                json!({
                    "action": attrs.get("action").cloned().unwrap_or_default(),
                    "method": attrs.get("method").cloned().unwrap_or_else(|| "get".into()),
                    "inputs": inputs,
                })
            })
            .collect()
    }

    fn links(&self, base: &str, html: &str) -> Vec<Value> {
        let base = Url::parse(base).ok();
        let mut links = Vec::new();
        for caps in self.link.captures_iter(html) {
            if links.len() >= MAX_LINKS {
                break;
            }
            let Some(href) = caps
                .get(1)
                .and_then(|m| self.attributes(m.as_str()).remove("href"))
            else {
                continue;
            };
            let href = href.trim();
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }
            let resolved = match &base {
                Some(base) => match base.join(href) {
                    Ok(url) => url.to_string(),
                    Err(_) => continue,
                },
                None => href.to_string(),
            };
            let text = caps
                .get(2)
                .map(|m| self.text.visible(m.as_str()))
                .unwrap_or_default();
            links.push(json!({ "text": text, "href": resolved }));
        }
        links
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionCapability for HeuristicExtractor {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn extract(&self, url: &str, content: &str, _prompt: &str) -> Result<Extracted, ExtractionError> {
        Ok(self.extract_page(url, content))
    }
}

fn insert_list(data: &mut Extracted, key: &str, items: Vec<String>) {
    if !items.is_empty() {
        data.insert(key.to_string(), json!(items));
    }
}

/// Matches in first-seen order, without duplicates.
fn unique(pattern: &Regex, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in pattern.find_iter(text) {
        let value = m.as_str().trim().to_string();
        if !found.contains(&value) {
            found.push(value);
        }
    }
    found
}
