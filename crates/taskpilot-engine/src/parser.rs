//! Rule-based instruction parser.
//!
//! Parsing is deterministic: a whole-string search template list is tried
//! first, then the text is split into fragments and every fragment is
//! classified by an ordered rule list where the first match wins.
//! Fragments no rule recognizes are dropped.

use regex::{Captures, Regex};
use tracing::debug;

use taskpilot_core::Action;

/// Whole-string `search ... then click ...` templates, in priority order.
const SEARCH_TEMPLATES: &[&str] = &[
    // search for "query" [then click target] [, trailing text is ignored]
    r#"(?is)^\s*search\s+(?:for\s+)?"(?P<query>[^"]+)"(?:\s*[,;]?\s*(?:and\s+then|then|and)\s+(?:click|tap|select)\s+(?:on\s+)?(?P<target>[^,;\n]+?)\s*[.!]?(?:\s*[,;\n].*)?)?\s*[.!]?\s*$"#,
    // search for query then click target (unquoted query, click required)
    r#"(?is)^\s*search\s+(?:for\s+)?(?P<query>[^",;\n]+?)\s*[,;]?\s*(?:and\s+then|then|and)\s+(?:click|tap|select)\s+(?:on\s+)?(?P<target>[^,;\n]+?)\s*[.!]?(?:\s*[,;\n].*)?$"#,
];

const DELIMITER: &str = r"(?i)[;,\n]|\b(?:and\s+then|after\s+that|then|next)\b";

const SEARCH_QUOTED: &str = r#"(?i)^search\s+(?:for\s+)?"(?P<query>[^"]+)""#;
const SEARCH_PLAIN: &str = r"(?i)^search\s+(?:for\s+)?(?P<query>.+)$";
const NAVIGATE: &str = r"(?i)^(?:go\s+to|navigate\s+to|visit|open)\s+(?P<url>\S+)";
const ENTER_INTO_QUOTED: &str = r#"(?i)^(?:enter|type|input)\s+"(?P<value>[^"]*)"\s+(?:into|in)\s+(?:the\s+)?"(?P<field>[^"]+)""#;
const FILL_WITH_QUOTED: &str = r#"(?i)^fill\s+(?:in\s+|out\s+)?(?:the\s+)?"(?P<field>[^"]+)"(?:\s+field)?\s+with\s+"(?P<value>[^"]*)""#;
const FILL_WITH_PLAIN: &str = r"(?i)^fill\s+(?:in\s+|out\s+)?(?:the\s+)?(?P<field>.+?)(?:\s+field)?\s+with\s+(?P<value>.+)$";
const ENTER_INTO_PLAIN: &str = r"(?i)^(?:enter|type|input)\s+(?P<value>.+?)\s+(?:into|in)\s+(?:the\s+)?(?P<field>.+?)(?:\s+field)?$";
const CLICK_QUOTED: &str = r#"(?i)^(?:click|press|tap|select)\s+(?:on\s+)?(?:the\s+)?"(?P<label>[^"]+)""#;
const CLICK_PLAIN: &str = r"(?i)^(?:click|tap|select)\s+(?:on\s+)?(?P<label>.+)$";
const WAIT: &str = r"(?i)^wait\s+(?:for\s+)?(?P<amount>\d+(?:\.\d+)?)\s*(?P<unit>milliseconds?|ms|minutes?|mins?|m|seconds?|secs?|s)?\b";
const SUBMIT: &str = r"(?i)\b(?:submit|press\s+enter|hit\s+enter)\b";

/// Converts free-text task descriptions into ordered [`Action`] lists.
pub struct InstructionParser {
    templates: Vec<Regex>,
    delimiter: Regex,
    search_quoted: Regex,
    search_plain: Regex,
    navigate: Regex,
    enter_into_quoted: Regex,
    fill_with_quoted: Regex,
    fill_with_plain: Regex,
    enter_into_plain: Regex,
    click_quoted: Regex,
    click_plain: Regex,
    wait: Regex,
    submit: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in parser pattern is valid")
}

impl InstructionParser {
    pub fn new() -> Self {
        Self {
            templates: SEARCH_TEMPLATES.iter().map(|p| compile(p)).collect(),
            delimiter: compile(DELIMITER),
            search_quoted: compile(SEARCH_QUOTED),
            search_plain: compile(SEARCH_PLAIN),
            navigate: compile(NAVIGATE),
            enter_into_quoted: compile(ENTER_INTO_QUOTED),
            fill_with_quoted: compile(FILL_WITH_QUOTED),
            fill_with_plain: compile(FILL_WITH_PLAIN),
            enter_into_plain: compile(ENTER_INTO_PLAIN),
            click_quoted: compile(CLICK_QUOTED),
            click_plain: compile(CLICK_PLAIN),
            wait: compile(WAIT),
            submit: compile(SUBMIT),
        }
    }

    /// Parse a task into actions. Never fails; unrecognized fragments are
    /// dropped.
    pub fn parse(&self, task: &str) -> Vec<Action> {
        if let Some(actions) = self.match_search_template(task) {
            debug!(count = actions.len(), "Task matched search template");
            return actions;
        }

        let mut actions = Vec::new();
        for fragment in self.split_fragments(task) {
            match self.classify(fragment) {
                Some(action) => actions.push(action),
                None => debug!(fragment = %fragment, "Dropping unrecognized fragment"),
            }
        }
        actions
    }

    fn match_search_template(&self, task: &str) -> Option<Vec<Action>> {
        for template in &self.templates {
            let Some(caps) = template.captures(task) else {
                continue;
            };
            let query = group(&caps, "query");
            if !is_search_query(query) {
                continue;
            }
            let mut actions = vec![Action::search(query)];
            if let Some(target) = caps.name("target") {
                let label = unquote_label(target.as_str());
                if !label.is_empty() {
                    actions.push(Action::click(label));
                }
            }
            return Some(actions);
        }
        None
    }

    /// Split on delimiters that are not inside double quotes.
    fn split_fragments<'a>(&self, task: &'a str) -> Vec<&'a str> {
        let quoted = quoted_spans(task);
        let mut fragments = Vec::new();
        let mut cursor = 0;

        for m in self.delimiter.find_iter(task) {
            if quoted.iter().any(|&(open, close)| m.start() > open && m.start() < close) {
                continue;
            }
            fragments.push(&task[cursor..m.start()]);
            cursor = m.end();
        }
        fragments.push(&task[cursor..]);

        fragments
            .into_iter()
            .map(clean_fragment)
            .filter(|fragment| !fragment.is_empty())
            .collect()
    }

    fn classify(&self, fragment: &str) -> Option<Action> {
        if let Some(caps) = self
            .search_quoted
            .captures(fragment)
            .or_else(|| self.search_plain.captures(fragment))
        {
            let query = unquote(group(&caps, "query"));
            if is_search_query(query) {
                return Some(Action::search(query));
            }
        }

        if let Some(caps) = self.navigate.captures(fragment) {
            let url = group(&caps, "url")
                .trim_matches(|c| matches!(c, '"' | '\'' | '<' | '>'))
                .trim_end_matches(['.', ',', '!']);
            if !url.is_empty() {
                return Some(Action::navigate(url));
            }
        }

        if let Some(action) = self.classify_fill(fragment) {
            return Some(action);
        }

        if let Some(caps) = self
            .click_quoted
            .captures(fragment)
            .or_else(|| self.click_plain.captures(fragment))
        {
            let label = group(&caps, "label");
            if !label.is_empty() {
                return Some(Action::click(label));
            }
        }

        if let Some(caps) = self.wait.captures(fragment) {
            if let Ok(amount) = group(&caps, "amount").parse::<f64>() {
                let unit = caps.name("unit").map(|u| u.as_str().to_ascii_lowercase());
                return Some(Action::wait(to_seconds(amount, unit.as_deref())));
            }
        }

        if self.submit.is_match(fragment) {
            return Some(Action::submit());
        }

        None
    }

    fn classify_fill(&self, fragment: &str) -> Option<Action> {
        let caps = self
            .enter_into_quoted
            .captures(fragment)
            .or_else(|| self.fill_with_quoted.captures(fragment))
            .or_else(|| self.fill_with_plain.captures(fragment))
            .or_else(|| self.enter_into_plain.captures(fragment))?;

        let field = unquote(group(&caps, "field"));
        let value = unquote(group(&caps, "value"));
        if field.is_empty() {
            return None;
        }
        Some(Action::fill(field, value))
    }
}

impl Default for InstructionParser {
    fn default() -> Self {
        Self::new()
    }
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map(|m| m.as_str().trim()).unwrap_or_default()
}

/// Byte ranges `(open, close)` of double-quoted segments. An unbalanced
/// quote runs to the end of the text.
fn quoted_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open = None;
    for (idx, ch) in text.char_indices() {
        if ch != '"' {
            continue;
        }
        match open.take() {
            Some(start) => spans.push((start, idx)),
            None => open = Some(idx),
        }
    }
    if let Some(start) = open {
        spans.push((start, text.len()));
    }
    spans
}

/// A bare "search for" leaves the connective as the only word.
fn is_search_query(query: &str) -> bool {
    !query.is_empty() && !query.eq_ignore_ascii_case("for")
}

fn clean_fragment(fragment: &str) -> &str {
    let mut fragment = fragment.trim().trim_end_matches(['.', '!']).trim_end();
    loop {
        let lower = fragment.get(..4).map(str::to_ascii_lowercase);
        match lower.as_deref() {
            Some("and ") => fragment = fragment[4..].trim_start(),
            _ => return fragment,
        }
    }
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    text
}

/// A click target from a search template: the first quoted segment when one
/// exists, otherwise the text as written.
fn unquote_label(target: &str) -> String {
    let target = target.trim();
    let mut parts = target.splitn(3, '"');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(inner), Some(_)) if !inner.trim().is_empty() => inner.trim().to_string(),
        _ => target.to_string(),
    }
}

fn to_seconds(amount: f64, unit: Option<&str>) -> f64 {
    match unit {
        Some(u) if u == "ms" || u.starts_with("millisecond") => amount / 1000.0,
        Some(u) if u == "m" || u.starts_with("min") => amount * 60.0,
        _ => amount,
    }
}
