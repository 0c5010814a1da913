//! Query normalization
//!
//! Reduces a conversational instruction ("could you open the billing page
//! on this site") to the few words worth matching against element text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Words kept after filtering
const MAX_QUERY_WORDS: usize = 6;

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["“”'‘’]([^"“”'‘’]{1,80})["“”'‘’]"#).expect("valid regex"));

static POLITENESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(please\s+)?(can\s+you\s+|could\s+you\s+)?(help\s+me\s+(to\s+)?)?")
        .expect("valid regex")
});

static LEADING_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(find|search\s*for|search|locate|open|go\s+to|navigate\s+to|click|show|take\s+me\s+to|bring\s+me\s+to)\s+",
    )
    .expect("valid regex")
});

static UI_NOUNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(button|tab|menu|page|section|link|icon|option|settings|setting)\b")
        .expect("valid regex")
});

static SITE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(on|in|within)\s+(this|the)?\s*([a-z0-9 ._-]+)(website|site|page|app)?\s*$")
        .expect("valid regex")
});

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "please", "can", "could", "you", "help", "me", "to", "find", "search", "locate", "open",
        "go", "navigate", "click", "show", "take", "bring", "the", "a", "an", "for", "of", "on",
        "in", "within", "this", "that", "website", "site", "page", "app", "button", "tab", "menu",
        "section", "link", "icon", "option", "settings", "setting",
    ]
    .into_iter()
    .collect()
});

/// Search query for a raw instruction.
///
/// A quoted phrase is returned as-is. Otherwise filler is stripped and at
/// most six meaningful words remain; when nothing survives, the trimmed
/// instruction comes back unchanged.
pub fn extract_query(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    if let Some(quoted) = QUOTED.captures(raw).and_then(|c| c.get(1)) {
        return quoted.as_str().trim().to_string();
    }

    let s = POLITENESS.replace(raw, "");
    let s = LEADING_VERB.replace(&s, "");
    let s = UI_NOUNS.replace_all(&s, " ");
    let s = SITE_CLAUSE.replace(&s, " ");

    let words: Vec<&str> = s
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w.to_lowercase().as_str()))
        .take(MAX_QUERY_WORDS)
        .collect();

    if words.is_empty() {
        return raw.to_string();
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_phrase_wins() {
        assert_eq!(extract_query(r#"click "Sign In""#), "Sign In");
        assert_eq!(extract_query("please open “ Account Center ” page"), "Account Center");
        assert_eq!(extract_query("find 'Watch later'"), "Watch later");
    }

    #[test]
    fn test_all_filler_falls_back_to_raw() {
        assert_eq!(
            extract_query("  please open the settings  "),
            "please open the settings"
        );
    }

    #[test]
    fn test_strips_politeness_verb_and_nouns() {
        assert_eq!(extract_query("could you help me to find the billing tab"), "billing");
        assert_eq!(extract_query("go to subscriptions"), "subscriptions");
        assert_eq!(extract_query("Navigate to Pricing page"), "Pricing");
        assert_eq!(extract_query("search for cats"), "cats");
    }

    #[test]
    fn test_strips_site_clause() {
        assert_eq!(extract_query("show pricing on this website"), "pricing");
    }

    #[test]
    fn test_keeps_first_six_words() {
        assert_eq!(
            extract_query("alpha beta gamma delta epsilon zeta eta theta"),
            "alpha beta gamma delta epsilon zeta"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_query("   "), "");
    }
}
