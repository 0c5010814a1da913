//! Guide overlay lifecycle
//!
//! At most one overlay exists per page. Creating a session always tears the
//! previous one down first; a listener task re-runs placement whenever the
//! page scrolls or resizes and clears the session when the user dismisses it.

use super::geometry::{compute_layout, Size};
use crate::config::OverlayConfig;
use crate::error::Result;
use crate::interact::click_element;
use crate::page::{NodeRef, OverlayEvent, OverlayEvents, PageContext};
use futures::StreamExt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Pause between scrolling the target into view and measuring it
const SCROLL_SETTLE: Duration = Duration::from_millis(180);

/// Pause between showing the guide and clicking the target
const CLICK_DELAY: Duration = Duration::from_millis(250);

/// Label text when the caller supplies none
const DEFAULT_MESSAGE: &str = "Click the highlighted element.";

/// The overlay currently mounted, if any
#[derive(Default)]
pub struct GuideSession {
    /// Element the overlay points at; only used to re-place, never owned
    target: Option<NodeRef>,
    /// Scroll/resize/dismiss listener for the mounted overlay
    listener: Option<JoinHandle<()>>,
    /// Bumped on every mount so a stale listener can tell it was replaced
    generation: u64,
}

struct OverlayInner<P: PageContext> {
    page: Arc<P>,
    config: OverlayConfig,
    session: Mutex<GuideSession>,
}

/// Handle to the page's single guide overlay
pub struct GuideOverlay<P: PageContext> {
    inner: Arc<OverlayInner<P>>,
}

impl<P: PageContext> Clone for GuideOverlay<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: PageContext> GuideOverlay<P> {
    pub fn new(page: Arc<P>, config: OverlayConfig) -> Self {
        Self {
            inner: Arc::new(OverlayInner {
                page,
                config,
                session: Mutex::new(GuideSession::default()),
            }),
        }
    }

    /// Replace any existing overlay with a fresh one pointing at `target`
    pub async fn create_session(&self, target: NodeRef, message: &str) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        teardown(self.inner.page.as_ref(), &mut session).await;

        let message = if message.trim().is_empty() {
            DEFAULT_MESSAGE
        } else {
            message
        };
        let events = self.inner.page.mount_overlay(message).await?;
        session.generation += 1;
        session.target = Some(target);
        session.listener = Some(tokio::spawn(listen(
            Arc::downgrade(&self.inner),
            session.generation,
            events,
        )));

        log::debug!(
            "Guide session {} created for node {}",
            session.generation,
            target.0
        );
        Ok(())
    }

    /// Position the overlay around `node` using its current box
    pub async fn place(&self, node: NodeRef) -> Result<()> {
        place_on(&self.inner, node).await
    }

    /// Remove the overlay and its listeners; a no-op without a session
    pub async fn clear_session(&self) {
        let mut session = self.inner.session.lock().await;
        teardown(self.inner.page.as_ref(), &mut session).await;
    }

    pub async fn target(&self) -> Option<NodeRef> {
        self.inner.session.lock().await.target
    }

    pub async fn is_active(&self) -> bool {
        self.inner.session.lock().await.listener.is_some()
    }

    /// Point at `node` with `message`, clicking it afterwards when
    /// `auto_click` is set. Returns `false` only when the click failed;
    /// overlay problems are logged and do not block the interaction.
    pub async fn guide_to(&self, node: NodeRef, message: &str, auto_click: bool) -> bool {
        let page = self.inner.page.as_ref();

        if let Err(e) = self.create_session(node, message).await {
            log::warn!("Failed to show guide overlay: {}", e);
        }
        if let Err(e) = page.scroll_into_view(node).await {
            log::debug!("Scroll into view failed for node {}: {}", node.0, e);
        }
        tokio::time::sleep(SCROLL_SETTLE).await;
        if let Err(e) = self.place(node).await {
            log::debug!("Placing guide for node {} failed: {}", node.0, e);
        }

        if !auto_click {
            return true;
        }
        tokio::time::sleep(CLICK_DELAY).await;
        click_element(page, node).await
    }
}

async fn place_on<P: PageContext>(inner: &OverlayInner<P>, node: NodeRef) -> Result<()> {
    let rect = inner.page.bounding_rect(node).await?;
    let viewport = inner.page.viewport().await?;
    let layout = compute_layout(
        &rect,
        Size {
            width: viewport.width,
            height: viewport.height,
        },
        &inner.config,
    );
    inner.page.update_overlay(&layout).await
}

async fn teardown<P: PageContext>(page: &P, session: &mut GuideSession) {
    if let Some(listener) = session.listener.take() {
        listener.abort();
    }
    session.target = None;
    if let Err(e) = page.unmount_overlay().await {
        log::warn!("Failed to remove guide overlay: {}", e);
    }
}

async fn listen<P: PageContext>(
    inner: Weak<OverlayInner<P>>,
    generation: u64,
    mut events: OverlayEvents,
) {
    while let Some(event) = events.next().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match event {
            OverlayEvent::Reflow => {
                let target = {
                    let session = inner.session.lock().await;
                    if session.generation != generation {
                        break;
                    }
                    session.target
                };
                if let Some(node) = target {
                    if let Err(e) = place_on(&inner, node).await {
                        log::debug!("Reflow placement for node {} failed: {}", node.0, e);
                    }
                }
            }
            OverlayEvent::Dismissed => {
                let mut session = inner.session.lock().await;
                if session.generation == generation {
                    log::debug!("Guide session {} dismissed", generation);
                    // Dropping our own handle detaches this task; it ends below.
                    session.listener.take();
                    session.target = None;
                    if let Err(e) = inner.page.unmount_overlay().await {
                        log::warn!("Failed to remove dismissed overlay: {}", e);
                    }
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::geometry::Rect;
    use crate::page::{MemoryPage, PageEvent, RawNode};

    fn setup() -> (Arc<MemoryPage>, GuideOverlay<MemoryPage>) {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        let overlay = GuideOverlay::new(page.clone(), OverlayConfig::default());
        (page, overlay)
    }

    fn count(page: &MemoryPage, f: impl Fn(&PageEvent) -> bool) -> usize {
        page.events().iter().filter(|e| f(e)).count()
    }

    #[tokio::test]
    async fn test_clear_without_session_is_noop() {
        let (page, overlay) = setup();
        overlay.clear_session().await;
        overlay.clear_session().await;
        assert!(page.events().is_empty());
        assert!(!overlay.is_active().await);
    }

    #[tokio::test]
    async fn test_blank_message_gets_default() {
        let (page, overlay) = setup();
        let node = page.add(RawNode::element("a").text("A"));
        overlay.create_session(node, "  ").await.unwrap();
        assert_eq!(
            page.events(),
            vec![PageEvent::OverlayMounted {
                message: DEFAULT_MESSAGE.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_new_session_replaces_old() {
        let (page, overlay) = setup();
        let a = page.add(RawNode::element("a").text("A"));
        let b = page.add(RawNode::element("a").text("B"));

        overlay.create_session(a, "first").await.unwrap();
        overlay.create_session(b, "second").await.unwrap();

        assert_eq!(overlay.target().await, Some(b));
        assert_eq!(count(&page, |e| matches!(e, PageEvent::OverlayMounted { .. })), 2);
        assert_eq!(count(&page, |e| matches!(e, PageEvent::OverlayUnmounted)), 1);
        assert!(page.overlay_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reflow_replaces_at_new_position() {
        let (page, overlay) = setup();
        let node = page.add(RawNode::element("button").text("Go").at(100.0, 100.0, 120.0, 40.0));

        overlay.create_session(node, "Click").await.unwrap();
        overlay.place(node).await.unwrap();
        assert_eq!(page.last_layout().unwrap().highlight.top, 94.0);

        page.set_rect(node, Rect::new(100.0, 400.0, 120.0, 40.0));
        assert!(page.emit(OverlayEvent::Reflow));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(page.last_layout().unwrap().highlight.top, 394.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_clears_session() {
        let (page, overlay) = setup();
        let node = page.add(RawNode::element("button").text("Go"));

        overlay.create_session(node, "Click").await.unwrap();
        assert!(page.emit(OverlayEvent::Dismissed));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!overlay.is_active().await);
        assert_eq!(overlay.target().await, None);
        assert!(!page.overlay_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guide_to_clicks_when_asked() {
        let (page, overlay) = setup();
        let node = page.add(RawNode::element("button").text("Go"));

        assert!(overlay.guide_to(node, "Click: \"Go\"", true).await);
        assert_eq!(page.clicks(), vec![node]);
        assert!(overlay.is_active().await);

        assert!(overlay.guide_to(node, "Look", false).await);
        assert_eq!(page.clicks().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guide_to_reports_failed_click() {
        let (page, overlay) = setup();
        let node = page.add(RawNode::element("button").text("Go"));
        page.remove(node);

        assert!(!overlay.guide_to(node, "Click", true).await);
    }
}
