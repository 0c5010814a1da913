//! [`PageContext`] over a live Chrome tab
//!
//! All DOM work runs through a small page-side bridge script evaluated
//! with each call. Element handles are ids into a `WeakRef` table kept in
//! the page, so a handle stops resolving once its element is collected or
//! detached. Overlay events come back through a CDP runtime binding.

use crate::error::{GuideError, Result};
use crate::overlay::geometry::{OverlayLayout, Rect};
use crate::page::{
    NodeQuery, NodeRef, NodeSnapshot, OverlayEvent, OverlayEvents, PageContext, RawNode, Viewport,
};
use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const BRIDGE_SCRIPT: &str = include_str!("page_bridge.js");
const OVERLAY_BINDING: &str = "__guideOverlayEvent";

#[derive(Deserialize)]
struct BridgeReply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireSnapshot {
    Read(RawNode),
    Unreadable(String),
}

#[derive(Deserialize)]
struct OverlayPayload {
    kind: String,
}

/// A Chrome tab seen through the guide bridge
#[derive(Clone)]
pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Run one bridge method and decode its value
    async fn call<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T> {
        let script = format!(
            "{}\nwindow.__guideBridge.call({}, {})",
            BRIDGE_SCRIPT,
            json!(method),
            args
        );

        let evaluated = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| GuideError::Script(format!("{} failed: {}", method, e)))?;
        let reply: BridgeReply = evaluated
            .into_value()
            .map_err(|e| GuideError::Script(format!("{} returned no reply: {}", method, e)))?;

        if !reply.ok {
            let error = reply.error.unwrap_or_default();
            if error.contains("no longer attached") {
                return Err(GuideError::ElementNotFound(error));
            }
            return Err(GuideError::Script(format!("{}: {}", method, error)));
        }

        serde_json::from_value(reply.value)
            .map_err(|e| GuideError::Script(format!("{} returned unexpected value: {}", method, e)))
    }
}

fn overlay_event(binding: &EventBindingCalled) -> Option<OverlayEvent> {
    if binding.name != OVERLAY_BINDING {
        return None;
    }
    let payload: OverlayPayload = match serde_json::from_str(&binding.payload) {
        Ok(payload) => payload,
        Err(e) => {
            log::debug!("Ignoring overlay payload {:?}: {}", binding.payload, e);
            return None;
        }
    };
    match payload.kind.as_str() {
        "reflow" => Some(OverlayEvent::Reflow),
        "dismissed" => Some(OverlayEvent::Dismissed),
        _ => None,
    }
}

#[async_trait]
impl PageContext for ChromePage {
    async fn location(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn viewport(&self) -> Result<Viewport> {
        self.call("viewport", json!([])).await
    }

    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<NodeSnapshot>> {
        let wire: Vec<WireSnapshot> = self.call("query", json!([query.css()])).await?;
        Ok(wire
            .into_iter()
            .map(|snapshot| match snapshot {
                WireSnapshot::Read(node) => NodeSnapshot::Read(node),
                WireSnapshot::Unreadable(reason) => NodeSnapshot::Unreadable { reason },
            })
            .collect())
    }

    async fn bounding_rect(&self, node: NodeRef) -> Result<Rect> {
        self.call("rect", json!([node])).await
    }

    async fn scroll_into_view(&self, node: NodeRef) -> Result<()> {
        self.call("scrollIntoView", json!([node])).await
    }

    async fn click(&self, node: NodeRef) -> Result<()> {
        self.call("click", json!([node])).await
    }

    async fn assign_value(&self, node: NodeRef, value: &str) -> Result<()> {
        self.call("assign", json!([node, value])).await
    }

    async fn press_enter(&self, node: NodeRef) -> Result<()> {
        self.call("enter", json!([node])).await
    }

    async fn scroll_by(&self, delta_y: f64) -> Result<()> {
        self.call("scrollBy", json!([delta_y])).await
    }

    async fn mount_overlay(&self, message: &str) -> Result<OverlayEvents> {
        // Re-adding an existing binding is accepted by Chrome
        self.page.execute(AddBindingParams::new(OVERLAY_BINDING)).await?;
        let events = self.page.event_listener::<EventBindingCalled>().await?;

        self.call::<()>("mount", json!([message])).await?;
        log::debug!("Overlay mounted");

        Ok(events
            .filter_map(|binding| async move { overlay_event(&binding) })
            .boxed())
    }

    async fn update_overlay(&self, layout: &OverlayLayout) -> Result<()> {
        self.call("update", json!([layout])).await
    }

    async fn unmount_overlay(&self) -> Result<()> {
        self.call("unmount", json!([])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_snapshot_decoding() {
        let wire: Vec<WireSnapshot> = serde_json::from_value(json!([
            {"read": {"node": 3, "tag": "a", "innerText": "Docs", "tabIndex": null, "value": null,
                      "rect": {"left": 1.0, "top": 2.0, "width": 30.0, "height": 10.0}}},
            {"unreadable": "getComputedStyle failed"}
        ]))
        .unwrap();

        match &wire[0] {
            WireSnapshot::Read(node) => {
                assert_eq!(node.node, NodeRef(3));
                assert_eq!(node.inner_text, "Docs");
                assert_eq!(node.tab_index, None);
                assert_eq!(node.rect.width, 30.0);
            }
            WireSnapshot::Unreadable(_) => panic!("expected a read node"),
        }
        assert!(matches!(&wire[1], WireSnapshot::Unreadable(r) if r == "getComputedStyle failed"));
    }

    #[test]
    fn test_bridge_reply_unit_value() {
        let reply: BridgeReply = serde_json::from_value(json!({"ok": true, "value": null})).unwrap();
        assert!(reply.ok);
        let unit: () = serde_json::from_value(reply.value).unwrap();
        assert_eq!(unit, ());
    }
}
