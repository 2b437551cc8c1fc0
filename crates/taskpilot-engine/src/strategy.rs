//! Ranked locator strategies per action kind.
//!
//! Each list is ordered most specific first. The executor walks a list and
//! stops at the first strategy that both resolves and performs.

use crate::page::Locator;

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// One way of finding the element an action targets.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorStrategy {
    pub name: &'static str,
    pub locator: Locator,
}

impl LocatorStrategy {
    fn css(name: &'static str, selector: String) -> Self {
        Self {
            name,
            locator: Locator::Css(selector),
        }
    }

    fn xpath(name: &'static str, expression: String) -> Self {
        Self {
            name,
            locator: Locator::XPath(expression),
        }
    }
}

/// Quote `value` as a CSS attribute string.
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Quote `value` as an XPath 1.0 string literal.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Case-insensitive `contains` over an XPath expression.
fn contains_ci(expr: &str, needle: &str) -> String {
    format!(
        "contains(translate({}, '{}', '{}'), {})",
        expr,
        UPPER,
        LOWER,
        xpath_literal(&needle.to_lowercase())
    )
}

fn strip_article(label: &str) -> &str {
    let label = label.trim();
    match label.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("the ") => label[4..].trim_start(),
        _ => label,
    }
}

pub fn fill_strategies(field: &str) -> Vec<LocatorStrategy> {
    let field = field.trim();
    let quoted = css_string(field);
    let mut strategies = vec![
        LocatorStrategy::css("name", format!("input[name={}]", quoted)),
        LocatorStrategy::css("id", format!("[id={}]", quoted)),
        LocatorStrategy::css("placeholder", format!("input[placeholder*={} i]", quoted)),
        LocatorStrategy::css("aria-label", format!("input[aria-label*={} i]", quoted)),
        LocatorStrategy::xpath(
            "label",
            format!(
                "//label[{}]/following::input[1]",
                contains_ci("normalize-space(.)", field)
            ),
        ),
        LocatorStrategy::css("name-contains", format!("input[name*={} i]", quoted)),
        LocatorStrategy::css("id-contains", format!("input[id*={} i]", quoted)),
    ];

    let normalized = field.to_lowercase().replace(' ', "_");
    if normalized != field {
        strategies.push(LocatorStrategy::css(
            "normalized-name",
            format!("input[name={}]", css_string(&normalized)),
        ));
    }

    strategies.extend([
        LocatorStrategy::css("textarea-name", format!("textarea[name={}]", quoted)),
        LocatorStrategy::css(
            "textarea-placeholder",
            format!("textarea[placeholder*={} i]", quoted),
        ),
        LocatorStrategy::css(
            "textarea-aria-label",
            format!("textarea[aria-label*={} i]", quoted),
        ),
    ]);
    strategies
}

/// Whether a click label asks for the first entry of a result list.
pub fn wants_first_result(label: &str) -> bool {
    let label = label.to_lowercase();
    label.contains("first") && ["result", "link", "item"].iter().any(|w| label.contains(w))
}

pub fn click_strategies(label: &str) -> Vec<LocatorStrategy> {
    let mut strategies = Vec::new();
    if wants_first_result(label) {
        strategies.extend([
            LocatorStrategy::css("google-result", "#search a h3".to_string()),
            LocatorStrategy::css(
                "amazon-result",
                "[data-component-type=\"s-search-result\"] h2 a".to_string(),
            ),
            LocatorStrategy::css("result-item", ".s-result-item h2 a".to_string()),
            LocatorStrategy::css("bing-result", "#b_results .b_algo h2 a".to_string()),
            LocatorStrategy::css("main-heading-link", "main a h3".to_string()),
            LocatorStrategy::css("heading-link", "a h3".to_string()),
        ]);
    }

    let text = strip_article(label);
    let exact = xpath_literal(text);
    let quoted = css_string(text);
    strategies.extend([
        LocatorStrategy::xpath(
            "button-text",
            format!("//button[normalize-space(.)={}]", exact),
        ),
        LocatorStrategy::xpath(
            "button-contains",
            format!("//button[{}]", contains_ci("normalize-space(.)", text)),
        ),
        LocatorStrategy::xpath(
            "link-contains",
            format!("//a[{}]", contains_ci("normalize-space(.)", text)),
        ),
        LocatorStrategy::xpath(
            "role-button",
            format!(
                "//*[@role='button'][{}]",
                contains_ci("normalize-space(.)", text)
            ),
        ),
        LocatorStrategy::xpath(
            "input-value",
            format!(
                "//input[(@type='submit' or @type='button') and {}]",
                contains_ci("@value", text)
            ),
        ),
        LocatorStrategy::css("aria-label", format!("[aria-label*={} i]", quoted)),
        LocatorStrategy::xpath(
            "any-text",
            format!(
                "(//body//*[not(*)][{}])[1]",
                contains_ci("normalize-space(.)", text)
            ),
        ),
    ]);
    strategies
}

pub fn search_input_strategies() -> Vec<LocatorStrategy> {
    [
        ("q", "input[name=\"q\"]"),
        ("textarea-q", "textarea[name=\"q\"]"),
        ("type-search", "input[type=\"search\"]"),
        ("name-search", "input[name=\"search\"]"),
        ("field-keywords", "input[name=\"field-keywords\"]"),
        ("aria-label", "input[aria-label*=\"search\" i]"),
        ("placeholder", "input[placeholder*=\"search\" i]"),
        ("id", "input[id*=\"search\" i]"),
    ]
    .into_iter()
    .map(|(name, selector)| LocatorStrategy::css(name, selector.to_string()))
    .collect()
}

pub fn submit_strategies() -> Vec<LocatorStrategy> {
    let mut strategies = vec![
        LocatorStrategy::css("button-submit", "button[type=\"submit\"]".to_string()),
        LocatorStrategy::css("input-submit", "input[type=\"submit\"]".to_string()),
    ];
    for word in ["submit", "send"] {
        strategies.push(LocatorStrategy::xpath(
            "button-text",
            format!("//button[{}]", contains_ci("normalize-space(.)", word)),
        ));
    }
    for word in ["submit", "send"] {
        strategies.push(LocatorStrategy::xpath(
            "input-value",
            format!("//input[{}]", contains_ci("@value", word)),
        ));
    }
    strategies
}
