//! Interaction primitives
//!
//! Each primitive reports success as a plain `bool`: a node that vanished
//! between resolution and interaction is an expected outcome on a live page,
//! not an error for the caller to propagate.

use crate::error::Result;
use crate::page::{NodeRef, PageContext};
use std::time::Duration;

/// Pause after scrolling an element into view
pub const SCROLL_SETTLE: Duration = Duration::from_millis(200);

/// Scroll into view, let the scroll settle, then focus and click
pub async fn click_element<P: PageContext + ?Sized>(page: &P, node: NodeRef) -> bool {
    let result: Result<()> = async {
        page.scroll_into_view(node).await?;
        tokio::time::sleep(SCROLL_SETTLE).await;
        page.click(node).await
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Click on node {} failed: {}", node.0, e);
            false
        }
    }
}

/// Replace the value of a field: clear it, then set `text`, notifying the
/// page after each change
pub async fn type_into<P: PageContext + ?Sized>(page: &P, node: NodeRef, text: &str) -> bool {
    let result: Result<()> = async {
        page.scroll_into_view(node).await?;
        tokio::time::sleep(SCROLL_SETTLE).await;
        page.assign_value(node, "").await?;
        page.assign_value(node, text).await
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Typing into node {} failed: {}", node.0, e);
            false
        }
    }
}

pub async fn press_enter<P: PageContext + ?Sized>(page: &P, node: NodeRef) -> bool {
    match page.press_enter(node).await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Enter on node {} failed: {}", node.0, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{MemoryPage, PageEvent, RawNode};

    #[tokio::test(start_paused = true)]
    async fn test_type_into_clears_first() {
        let page = MemoryPage::new("https://example.com/");
        let field = page.add(RawNode::element("input").value("old"));

        assert!(type_into(&page, field, "new").await);
        assert_eq!(page.value_of(field).as_deref(), Some("new"));
        assert_eq!(
            page.events(),
            vec![
                PageEvent::ScrolledIntoView(field),
                PageEvent::ValueAssigned {
                    node: field,
                    value: String::new()
                },
                PageEvent::ValueAssigned {
                    node: field,
                    value: "new".into()
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_node_reports_false() {
        let page = MemoryPage::new("https://example.com/");
        let button = page.add(RawNode::element("button").text("Go"));
        page.remove(button);

        assert!(!click_element(&page, button).await);
        assert!(!type_into(&page, button, "x").await);
        assert!(!press_enter(&page, button).await);
        assert!(page.events().is_empty());
    }
}
