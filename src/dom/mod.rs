//! Element predicates
//!
//! Visibility, clickability and display-text rules applied to nodes read
//! from the page.

pub mod selector;

use crate::page::RawNode;

pub use selector::{build_selector, escape_css};

/// Longest display text kept for an element, in characters
pub const MAX_TEXT_CHARS: usize = 160;

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text a user would read on the element: rendered text, then aria-label,
/// then title, then current value
pub fn display_text(node: &RawNode) -> String {
    let value = node.value.as_deref().unwrap_or("");
    let raw = [
        node.inner_text.as_str(),
        node.aria_label.as_str(),
        node.title.as_str(),
        value,
    ]
    .into_iter()
    .find(|s| !s.is_empty())
    .unwrap_or("");

    collapse_whitespace(raw).chars().take(MAX_TEXT_CHARS).collect()
}

/// Rendered with a usable box
pub fn is_visible(node: &RawNode) -> bool {
    let style = &node.style;
    if style.display == "none" || style.visibility == "hidden" {
        return false;
    }
    let opacity = style.opacity.trim();
    if !opacity.is_empty() && opacity.parse::<f64>().map(|o| o == 0.0).unwrap_or(false) {
        return false;
    }
    node.rect.width > 1.0 && node.rect.height > 1.0
}

/// Best-effort guess that clicking the element does something. Handlers
/// attached with `addEventListener` are invisible here.
pub fn is_clickable(node: &RawNode) -> bool {
    match node.tag.as_str() {
        "a" | "button" => true,
        "input" => matches!(
            node.input_type.to_lowercase().as_str(),
            "button" | "submit"
        ),
        _ => node.role == "button" || node.has_click_property,
    }
}

/// Text field that looks like a site search box
pub fn is_search_field(node: &RawNode) -> bool {
    let role = node.role.to_lowercase();
    let input_type = node.input_type.to_lowercase();
    role == "searchbox"
        || input_type == "search"
        || node.aria_label.to_lowercase().contains("search")
        || node.placeholder.to_lowercase().contains("search")
}

/// Anchor pointing at a video watch page
pub fn is_watch_link(node: &RawNode) -> bool {
    node.href.contains("/watch")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text_fallbacks() {
        let node = RawNode::element("button").aria_label("Close dialog");
        assert_eq!(display_text(&node), "Close dialog");

        let mut node = RawNode::element("input").value("hello");
        assert_eq!(display_text(&node), "hello");
        node.title = "Title wins over value".into();
        assert_eq!(display_text(&node), "Title wins over value");

        let node = RawNode::element("a").text("  Sign \n\t in  ").aria_label("ignored");
        assert_eq!(display_text(&node), "Sign in");
    }

    #[test]
    fn test_display_text_truncates_by_chars() {
        let long = "é".repeat(400);
        let node = RawNode::element("a").text(&long);
        assert_eq!(display_text(&node).chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn test_visibility() {
        assert!(is_visible(&RawNode::element("a")));
        assert!(!is_visible(&RawNode::element("a").styled("none", "visible", "1")));
        assert!(!is_visible(&RawNode::element("a").styled("block", "hidden", "1")));
        assert!(!is_visible(&RawNode::element("a").styled("block", "visible", "0")));
        assert!(is_visible(&RawNode::element("a").styled("block", "visible", "0.5")));
        assert!(!is_visible(&RawNode::element("a").at(0.0, 0.0, 1.0, 20.0)));
        assert!(!is_visible(&RawNode::element("a").at(0.0, 0.0, 20.0, 1.0)));
    }

    #[test]
    fn test_clickability() {
        assert!(is_clickable(&RawNode::element("a")));
        assert!(is_clickable(&RawNode::element("button")));
        assert!(is_clickable(&RawNode::element("input").input_type("Submit")));
        assert!(!is_clickable(&RawNode::element("input").input_type("text")));
        assert!(is_clickable(&RawNode::element("div").role("button")));
        assert!(is_clickable(&RawNode::element("div").onclick()));
        assert!(!is_clickable(&RawNode::element("div").tab_index("0")));
    }

    #[test]
    fn test_search_field() {
        assert!(is_search_field(&RawNode::element("input").input_type("search")));
        assert!(is_search_field(&RawNode::element("input").role("searchbox")));
        assert!(is_search_field(&RawNode::element("input").placeholder("Search videos")));
        assert!(is_search_field(&RawNode::element("textarea").aria_label("SEARCH")));
        assert!(!is_search_field(&RawNode::element("input").placeholder("Email")));
    }
}
