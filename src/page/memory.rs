//! In-memory page
//!
//! A [`PageContext`] backed by a plain list of nodes. Interactions are
//! recorded as [`PageEvent`]s so callers can check what the engine did.

use super::{
    ComputedStyle, NodeQuery, NodeRef, NodeSnapshot, OverlayEvent, OverlayEvents, PageContext,
    PathSegment, RawNode, Viewport,
};
use crate::dom::selector::build_selector;
use crate::error::{GuideError, Result};
use crate::overlay::geometry::{OverlayLayout, Rect};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use std::sync::{Mutex, MutexGuard};

/// Something the engine did to the page
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    ScrolledIntoView(NodeRef),
    Clicked(NodeRef),
    ValueAssigned { node: NodeRef, value: String },
    EnterPressed(NodeRef),
    ScrolledBy(f64),
    OverlayMounted { message: String },
    OverlayUpdated(OverlayLayout),
    OverlayUnmounted,
}

struct MemoryNode {
    raw: RawNode,
    unreadable: bool,
    removed: bool,
    navigates_to: Option<String>,
}

struct MemoryState {
    location: String,
    title: String,
    viewport: Viewport,
    nodes: Vec<MemoryNode>,
    next_handle: u64,
    events: Vec<PageEvent>,
    overlay_tx: Option<mpsc::UnboundedSender<OverlayEvent>>,
}

impl MemoryState {
    fn live_node(&mut self, node: NodeRef) -> Result<&mut MemoryNode> {
        self.nodes
            .iter_mut()
            .find(|n| n.raw.node == node && !n.removed)
            .ok_or_else(|| GuideError::ElementNotFound(format!("node {}", node.0)))
    }
}

pub struct MemoryPage {
    state: Mutex<MemoryState>,
}

impl MemoryPage {
    /// Empty page at `location` with a 1280x800 viewport
    pub fn new(location: &str) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                location: location.to_string(),
                title: String::new(),
                viewport: Viewport {
                    width: 1280.0,
                    height: 800.0,
                    scroll_x: 0.0,
                    scroll_y: 0.0,
                },
                nodes: Vec::new(),
                next_handle: 1,
                events: Vec::new(),
                overlay_tx: None,
            }),
        }
    }

    pub fn with_title(self, title: &str) -> Self {
        self.lock().title = title.to_string();
        self
    }

    pub fn with_viewport(self, width: f64, height: f64) -> Self {
        {
            let mut state = self.lock();
            state.viewport.width = width;
            state.viewport.height = height;
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a node in document order and return its handle
    pub fn add(&self, mut raw: RawNode) -> NodeRef {
        let mut state = self.lock();
        let handle = NodeRef(state.next_handle);
        state.next_handle += 1;
        raw.node = handle;
        if raw.path.is_empty() {
            raw.path.push(PathSegment {
                tag: raw.tag.clone(),
                id: raw.id.clone(),
                classes: raw.classes.clone(),
                same_tag_count: 1,
                same_tag_index: 1,
            });
        }
        state.nodes.push(MemoryNode {
            raw,
            unreadable: false,
            removed: false,
            navigates_to: None,
        });
        handle
    }

    /// Append a node whose attributes cannot be read
    pub fn add_unreadable(&self, raw: RawNode) -> NodeRef {
        let handle = self.add(raw);
        if let Some(n) = self.lock().nodes.iter_mut().find(|n| n.raw.node == handle) {
            n.unreadable = true;
        }
        handle
    }

    /// Clicking `node` moves the page to `location`
    pub fn link(&self, node: NodeRef, location: &str) {
        if let Some(n) = self.lock().nodes.iter_mut().find(|n| n.raw.node == node) {
            n.navigates_to = Some(location.to_string());
        }
    }

    /// Detach a node from the page; its handle stops resolving
    pub fn remove(&self, node: NodeRef) {
        if let Some(n) = self.lock().nodes.iter_mut().find(|n| n.raw.node == node) {
            n.removed = true;
        }
    }

    pub fn set_rect(&self, node: NodeRef, rect: Rect) {
        if let Some(n) = self.lock().nodes.iter_mut().find(|n| n.raw.node == node) {
            n.raw.rect = rect;
        }
    }

    pub fn set_location(&self, location: &str) {
        self.lock().location = location.to_string();
    }

    pub fn value_of(&self, node: NodeRef) -> Option<String> {
        self.lock()
            .nodes
            .iter()
            .find(|n| n.raw.node == node)
            .and_then(|n| n.raw.value.clone())
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.lock().events.clone()
    }

    pub fn clicks(&self) -> Vec<NodeRef> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                PageEvent::Clicked(node) => Some(*node),
                _ => None,
            })
            .collect()
    }

    pub fn overlay_mounted(&self) -> bool {
        self.lock().overlay_tx.is_some()
    }

    pub fn last_layout(&self) -> Option<OverlayLayout> {
        self.lock().events.iter().rev().find_map(|e| match e {
            PageEvent::OverlayUpdated(layout) => Some(*layout),
            _ => None,
        })
    }

    /// Deliver an overlay event as if the page raised it; false when no
    /// overlay is listening
    pub fn emit(&self, event: OverlayEvent) -> bool {
        match &self.lock().overlay_tx {
            Some(tx) => tx.unbounded_send(event).is_ok(),
            None => false,
        }
    }

    fn selector_matches(raw: &RawNode, selector: &str) -> bool {
        match selector.strip_prefix('#') {
            Some(id) => raw.id == id,
            None => build_selector(&raw.path) == selector,
        }
    }
}

#[async_trait]
impl PageContext for MemoryPage {
    async fn location(&self) -> Result<String> {
        Ok(self.lock().location.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.lock().title.clone())
    }

    async fn viewport(&self) -> Result<Viewport> {
        Ok(self.lock().viewport)
    }

    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<NodeSnapshot>> {
        let state = self.lock();
        Ok(state
            .nodes
            .iter()
            .filter(|n| !n.removed)
            .filter(|n| match query {
                NodeQuery::Selector(selector) => Self::selector_matches(&n.raw, selector),
                other => other.matches(&n.raw),
            })
            .map(|n| {
                if n.unreadable {
                    NodeSnapshot::Unreadable {
                        reason: "attribute access denied".to_string(),
                    }
                } else {
                    NodeSnapshot::Read(n.raw.clone())
                }
            })
            .collect())
    }

    async fn bounding_rect(&self, node: NodeRef) -> Result<Rect> {
        Ok(self.lock().live_node(node)?.raw.rect)
    }

    async fn scroll_into_view(&self, node: NodeRef) -> Result<()> {
        let mut state = self.lock();
        state.live_node(node)?;
        state.events.push(PageEvent::ScrolledIntoView(node));
        Ok(())
    }

    async fn click(&self, node: NodeRef) -> Result<()> {
        let mut state = self.lock();
        let target = state.live_node(node)?.navigates_to.clone();
        state.events.push(PageEvent::Clicked(node));
        if let Some(location) = target {
            state.location = location;
        }
        Ok(())
    }

    async fn assign_value(&self, node: NodeRef, value: &str) -> Result<()> {
        let mut state = self.lock();
        state.live_node(node)?.raw.value = Some(value.to_string());
        state.events.push(PageEvent::ValueAssigned {
            node,
            value: value.to_string(),
        });
        Ok(())
    }

    async fn press_enter(&self, node: NodeRef) -> Result<()> {
        let mut state = self.lock();
        state.live_node(node)?;
        state.events.push(PageEvent::EnterPressed(node));
        Ok(())
    }

    async fn scroll_by(&self, delta_y: f64) -> Result<()> {
        let mut state = self.lock();
        state.viewport.scroll_y = (state.viewport.scroll_y + delta_y).max(0.0);
        state.events.push(PageEvent::ScrolledBy(delta_y));
        Ok(())
    }

    async fn mount_overlay(&self, message: &str) -> Result<OverlayEvents> {
        let (tx, rx) = mpsc::unbounded();
        let mut state = self.lock();
        state.overlay_tx = Some(tx);
        state.events.push(PageEvent::OverlayMounted {
            message: message.to_string(),
        });
        Ok(rx.boxed())
    }

    async fn update_overlay(&self, layout: &OverlayLayout) -> Result<()> {
        let mut state = self.lock();
        if state.overlay_tx.is_none() {
            return Err(GuideError::Other("overlay is not mounted".to_string()));
        }
        state.events.push(PageEvent::OverlayUpdated(*layout));
        Ok(())
    }

    async fn unmount_overlay(&self) -> Result<()> {
        let mut state = self.lock();
        if state.overlay_tx.take().is_some() {
            state.events.push(PageEvent::OverlayUnmounted);
        }
        Ok(())
    }
}

// ===== NODE BUILDERS =====

impl RawNode {
    /// Visible 100x20 element at the viewport origin
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            style: ComputedStyle {
                display: "block".to_string(),
                visibility: "visible".to_string(),
                opacity: "1".to_string(),
            },
            rect: Rect::new(0.0, 0.0, 100.0, 20.0),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.inner_text = text.to_string();
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn input_type(mut self, input_type: &str) -> Self {
        self.input_type = input_type.to_string();
        self
    }

    pub fn aria_label(mut self, label: &str) -> Self {
        self.aria_label = label.to_string();
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = href.to_string();
        self
    }

    pub fn tab_index(mut self, index: &str) -> Self {
        self.tab_index = Some(index.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn onclick(mut self) -> Self {
        self.has_click_property = true;
        self
    }

    pub fn at(mut self, left: f64, top: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(left, top, width, height);
        self
    }

    pub fn styled(mut self, display: &str, visibility: &str, opacity: &str) -> Self {
        self.style = ComputedStyle {
            display: display.to_string(),
            visibility: visibility.to_string(),
            opacity: opacity.to_string(),
        };
        self
    }

    pub fn path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }
}
