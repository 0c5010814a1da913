//! Page observation
//!
//! A bounded, reading-order snapshot of the interactive elements on the
//! page, suitable for handing to a planner.

use crate::dom::{build_selector, display_text, is_visible};
use crate::error::Result;
use crate::page::{NodeQuery, NodeSnapshot, PageContext, RawNode, Viewport};
use serde::{Deserialize, Serialize};

/// One interactive element as seen at capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub tag: String,
    pub text: String,
    pub selector: String,
    pub role: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub aria_label: String,
    pub placeholder: String,
    pub value: String,
    pub href: String,
    /// Document coordinates
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl ElementDescriptor {
    pub fn from_node(node: &RawNode, viewport: &Viewport) -> Self {
        Self {
            tag: node.tag.to_lowercase(),
            text: display_text(node),
            selector: build_selector(&node.path),
            role: node.role.clone(),
            input_type: node.input_type.clone(),
            aria_label: node.aria_label.clone(),
            placeholder: node.placeholder.clone(),
            value: node.value.clone().unwrap_or_default(),
            href: node.href.clone(),
            x: (node.rect.left + viewport.scroll_x).round() as i64,
            y: (node.rect.top + viewport.scroll_y).round() as i64,
            width: node.rect.width.round() as i64,
            height: node.rect.height.round() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub url: String,
    pub title: String,
    pub viewport: Viewport,
    /// Sorted top-to-bottom, then left-to-right
    pub elements: Vec<ElementDescriptor>,
}

/// Reading order: ascending `y`, ties by ascending `x`
pub fn sort_reading_order(elements: &mut [ElementDescriptor]) {
    elements.sort_by(|a, b| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));
}

/// Capture at most `max_elements` visible interactive elements
pub async fn capture<P: PageContext + ?Sized>(page: &P, max_elements: usize) -> Result<Observation> {
    let url = page.location().await?;
    let title = page.title().await?;
    let viewport = page.viewport().await?;

    let snapshots = page.query_nodes(&NodeQuery::Interactive).await?;
    let total = snapshots.len();

    let mut elements: Vec<ElementDescriptor> = snapshots
        .into_iter()
        .filter_map(|snapshot| match snapshot {
            NodeSnapshot::Read(node) => Some(node),
            NodeSnapshot::Unreadable { reason } => {
                log::debug!("Skipping unreadable element: {}", reason);
                None
            }
        })
        .filter(is_visible)
        .map(|node| ElementDescriptor::from_node(&node, &viewport))
        .collect();

    sort_reading_order(&mut elements);
    let visible = elements.len();
    elements.truncate(max_elements);

    log::debug!(
        "Observation of {}: {} matched, {} visible, {} kept",
        url,
        total,
        visible,
        elements.len()
    );

    Ok(Observation {
        url,
        title,
        viewport,
        elements,
    })
}
