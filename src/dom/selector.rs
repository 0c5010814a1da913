//! Selector builder
//!
//! Turns an element's ancestry into a short CSS selector. The result is a
//! hint for later lookups, rebuilt on every capture and never cached.

use crate::page::PathSegment;

/// Levels walked before giving up on reaching an identified ancestor
const MAX_DEPTH: usize = 5;

/// Class tokens kept per level
const MAX_CLASSES: usize = 2;

/// Build a selector for the element at `path[0]`, whose ancestors follow
pub fn build_selector(path: &[PathSegment]) -> String {
    let Some(first) = path.first() else {
        return String::new();
    };
    if !first.id.is_empty() {
        return format!("#{}", escape_css(&first.id));
    }

    let mut parts: Vec<String> = Vec::new();
    for segment in path.iter().take(MAX_DEPTH) {
        let mut part = segment.tag.to_lowercase();
        if !segment.id.is_empty() {
            part.push('#');
            part.push_str(&escape_css(&segment.id));
            parts.push(part);
            break;
        }
        for class in segment
            .classes
            .iter()
            .filter(|c| !c.is_empty())
            .take(MAX_CLASSES)
        {
            part.push('.');
            part.push_str(&escape_css(class));
        }
        if segment.same_tag_count > 1 {
            part.push_str(&format!(":nth-of-type({})", segment.same_tag_index));
        }
        parts.push(part);
    }

    parts.reverse();
    parts.join(" > ")
}

/// Escape an identifier the way `CSS.escape` does
pub fn escape_css(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());

    if chars.len() == 1 && chars[0] == '-' {
        return "\\-".to_string();
    }

    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if code == 0 {
            out.push('\u{FFFD}');
        } else if (0x1..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{:x} ", code));
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}
