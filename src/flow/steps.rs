//! Step parsing
//!
//! A multi-step instruction ("go to subscriptions, then play MKBHD") is
//! split into steps, and each step is classified before it is dispatched.

use once_cell::sync::Lazy;
use regex::Regex;

static CONJUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(and\s+then|then)\b").expect("valid regex"));

static SEMICOLONS: Lazy<Regex> = Lazy::new(|| Regex::new(r";+").expect("valid regex"));

static SEARCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsearch\s*(for)?\s+(.+)$").expect("valid regex"));

static PLAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(play|open|watch)\s+(.+)$").expect("valid regex"));

static AUTO_CLICK_VERBS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(go to|open|click|press|navigate|play|watch|select|choose|search|look up|type|enter)\b",
    )
    .expect("valid regex")
});

/// Split an instruction into ordered steps. Only blank input yields no steps.
pub fn split_steps(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let normalized = CONJUNCTION.replace_all(raw, ",");
    let normalized = SEMICOLONS.replace_all(&normalized, ",");
    let parts: Vec<String> = normalized
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if parts.is_empty() {
        vec![raw.to_string()]
    } else {
        parts
    }
}

/// What a step asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Type into the site's search box and submit
    Search(String),
    /// Pick a video on a media site
    Play(String),
    /// Find an element by its text and click it
    Click(String),
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Search(_) => "search",
            StepKind::Play(_) => "play",
            StepKind::Click(_) => "click",
        }
    }
}

/// Classify a step; the first matching rule wins. Play only applies on a
/// recognized media host.
pub fn classify(step: &str, on_media_host: bool) -> StepKind {
    if let Some(text) = capture_rest(&SEARCH, step) {
        return StepKind::Search(text);
    }
    if on_media_host {
        if let Some(text) = capture_rest(&PLAY, step) {
            return StepKind::Play(text);
        }
    }
    StepKind::Click(step.trim().to_string())
}

fn capture_rest(re: &Regex, step: &str) -> Option<String> {
    re.captures(step)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Whether an instruction reads like a request to act rather than to be
/// shown: a single word, or one containing an action verb
pub fn should_auto_click(raw: &str) -> bool {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return false;
    }
    if s.split_whitespace().count() == 1 {
        return true;
    }
    AUTO_CLICK_VERBS.is_match(&s)
}
