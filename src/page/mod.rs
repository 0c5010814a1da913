//! Live page abstraction
//!
//! Everything the engine knows about a page goes through [`PageContext`].
//! Reads return plain snapshot values; elements are addressed by opaque
//! [`NodeRef`] handles that may stop resolving at any time.

pub mod memory;

use crate::error::Result;
use crate::overlay::geometry::{OverlayLayout, Rect};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use memory::{MemoryPage, PageEvent};

/// Opaque handle to one element of the live page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

/// Computed style values relevant to visibility
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: String,
}

/// One level of an element's ancestry, element first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathSegment {
    pub tag: String,
    pub id: String,
    pub classes: Vec<String>,
    /// Children of the parent sharing this tag (0 at the root)
    pub same_tag_count: usize,
    /// 1-based position among those children
    pub same_tag_index: usize,
}

/// Raw attributes of one element as read from the page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawNode {
    pub node: NodeRef,
    pub tag: String,
    pub id: String,
    pub classes: Vec<String>,
    pub role: String,
    pub input_type: String,
    pub aria_label: String,
    pub placeholder: String,
    pub title: String,
    pub href: String,
    pub tab_index: Option<String>,
    pub content_editable: bool,
    pub inner_text: String,
    /// `None` when the element has no `value` property
    pub value: Option<String>,
    /// `onclick` is a function on the element
    pub has_click_property: bool,
    pub style: ComputedStyle,
    /// Bounding box relative to the viewport
    pub rect: Rect,
    /// Element and up to four ancestors, element first
    pub path: Vec<PathSegment>,
}

/// Result of reading one matched element
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSnapshot {
    Read(RawNode),
    /// Reading the element raised; the scan carries on without it
    Unreadable { reason: String },
}

/// Element sets the engine asks the page for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeQuery {
    /// Anything a user could interact with
    Interactive,
    /// Click targets for text lookups
    Clickable,
    /// Single- and multi-line text fields
    TextFields,
    /// Title anchors of video tiles
    VideoTitles,
    Anchors,
    /// Exact CSS selector
    Selector(String),
}

impl NodeQuery {
    /// CSS selector the query stands for
    pub fn css(&self) -> &str {
        match self {
            NodeQuery::Interactive => {
                "a,button,input,textarea,select,[role='button'],[role='link'],[contenteditable='true'],[tabindex]"
            }
            NodeQuery::Clickable => "a,button,input,[role='button'],[tabindex]",
            NodeQuery::TextFields => "input,textarea",
            NodeQuery::VideoTitles => "a#video-title, a.yt-simple-endpoint#video-title",
            NodeQuery::Anchors => "a",
            NodeQuery::Selector(selector) => selector.as_str(),
        }
    }

    /// Same membership test as [`NodeQuery::css`], evaluated on a read node.
    /// `Selector` is matched by the backend and always yields `false` here.
    pub fn matches(&self, node: &RawNode) -> bool {
        let tag = node.tag.as_str();
        match self {
            NodeQuery::Interactive => {
                matches!(tag, "a" | "button" | "input" | "textarea" | "select")
                    || node.role == "button"
                    || node.role == "link"
                    || node.content_editable
                    || node.tab_index.is_some()
            }
            NodeQuery::Clickable => {
                matches!(tag, "a" | "button" | "input")
                    || node.role == "button"
                    || node.tab_index.is_some()
            }
            NodeQuery::TextFields => matches!(tag, "input" | "textarea"),
            NodeQuery::VideoTitles => tag == "a" && node.id == "video-title",
            NodeQuery::Anchors => tag == "a",
            NodeQuery::Selector(_) => false,
        }
    }
}

/// Events raised by a mounted overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    /// The page scrolled or the window resized
    Reflow,
    /// The user dismissed the overlay
    Dismissed,
}

pub type OverlayEvents = BoxStream<'static, OverlayEvent>;

/// A live, externally mutable page
#[async_trait]
pub trait PageContext: Send + Sync + 'static {
    async fn location(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    async fn viewport(&self) -> Result<Viewport>;

    /// Read every element matching `query`, in document order
    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<NodeSnapshot>>;

    /// Current viewport-relative box of a node
    async fn bounding_rect(&self, node: NodeRef) -> Result<Rect>;

    async fn scroll_into_view(&self, node: NodeRef) -> Result<()>;

    /// Focus and click
    async fn click(&self, node: NodeRef) -> Result<()>;

    /// Set the value and fire `input` and `change`
    async fn assign_value(&self, node: NodeRef, value: &str) -> Result<()>;

    /// Fire keydown, keypress and keyup for Enter
    async fn press_enter(&self, node: NodeRef) -> Result<()>;

    async fn scroll_by(&self, delta_y: f64) -> Result<()>;

    /// Install the overlay with its message and start listening for
    /// scroll/resize (capture phase) and dismissal
    async fn mount_overlay(&self, message: &str) -> Result<OverlayEvents>;

    async fn update_overlay(&self, layout: &OverlayLayout) -> Result<()>;

    /// Remove overlay nodes, injected styles and listeners; fine to call
    /// when nothing is mounted
    async fn unmount_overlay(&self) -> Result<()>;
}

/// Host part of a page location, lowercased; empty when unparsable
pub fn host_of(location: &str) -> String {
    url::Url::parse(location)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

/// Locations where injected guidance is not allowed
pub fn is_restricted_location(location: &str) -> bool {
    location.starts_with("chrome://") || location.starts_with("chrome-extension://")
}
