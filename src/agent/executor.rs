//! Planner action execution

use super::action::{Action, ActionResult, DEFAULT_WAIT_MS};
use crate::interact::{press_enter, type_into, SCROLL_SETTLE};
use crate::locate::resolve;
use crate::overlay::GuideOverlay;
use crate::page::PageContext;
use std::sync::Arc;
use std::time::Duration;

/// Executes planner actions against one page. Stateless between calls.
pub struct ActionExecutor<P: PageContext> {
    page: Arc<P>,
    overlay: GuideOverlay<P>,
}

impl<P: PageContext> ActionExecutor<P> {
    pub fn new(page: Arc<P>, overlay: GuideOverlay<P>) -> Self {
        Self { page, overlay }
    }

    /// Run one action. Never fails outright: an unusable action waits, and
    /// `navigated` reports whether the page location changed meanwhile.
    pub async fn execute(&self, action: &Action) -> ActionResult {
        let before = self.location().await;
        log::info!("Executing {} action", action.kind());

        let outcome = match action {
            Action::Click { .. } => self.click(action).await,
            Action::Type { value, enter, .. } => self.type_text(action, value, *enter).await,
            Action::Scroll { delta_y, .. } => self.scroll(delta_y.unwrap_or(0.0)).await,
            Action::Wait { ms, .. } => {
                tokio::time::sleep(millis(ms.unwrap_or(DEFAULT_WAIT_MS))).await;
                Ok(String::new())
            }
            Action::Done { .. } => Ok("Done.".to_string()),
            Action::Unknown => {
                tokio::time::sleep(millis(DEFAULT_WAIT_MS)).await;
                Ok("Unknown action, waiting.".to_string())
            }
        };

        let (ok, message) = match outcome {
            Ok(message) => (true, message),
            Err(message) => (false, message.to_string()),
        };
        if !ok {
            log::warn!("{} action failed: {}", action.kind(), message);
        }

        ActionResult {
            ok,
            navigated: self.location().await != before,
            message,
        }
    }

    async fn click(&self, action: &Action) -> Result<String, &'static str> {
        let locator = action.locator().unwrap_or_default();
        let node = resolve(self.page.as_ref(), &locator)
            .await
            .ok_or("Element not found for click.")?;

        let reason = action.reason().unwrap_or("Agent click");
        if !self.overlay.guide_to(node, reason, true).await {
            return Err("Click failed.");
        }
        Ok(String::new())
    }

    async fn type_text(
        &self,
        action: &Action,
        value: &str,
        enter: bool,
    ) -> Result<String, &'static str> {
        let locator = action.locator().unwrap_or_default();
        let page = self.page.as_ref();
        let node = resolve(page, &locator)
            .await
            .ok_or("Element not found for typing.")?;

        let reason = action.reason().unwrap_or("Agent type");
        self.overlay.guide_to(node, reason, false).await;

        if !type_into(page, node, value).await {
            return Err("Typing failed.");
        }
        if enter {
            press_enter(page, node).await;
        }
        Ok(String::new())
    }

    async fn scroll(&self, delta_y: f64) -> Result<String, &'static str> {
        if let Err(e) = self.page.scroll_by(delta_y).await {
            log::warn!("Scroll by {} failed: {}", delta_y, e);
            return Err("Scroll failed.");
        }
        tokio::time::sleep(SCROLL_SETTLE).await;
        Ok(String::new())
    }

    async fn location(&self) -> String {
        self.page.location().await.unwrap_or_else(|e| {
            log::debug!("Could not read page location: {}", e);
            String::new()
        })
    }
}

/// Longest pause a planner can ask for
const MAX_WAIT_MS: f64 = 30_000.0;

/// Planner durations are fractional milliseconds; nonsense becomes zero,
/// anything longer than [`MAX_WAIT_MS`] is capped
fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms.min(MAX_WAIT_MS) / 1000.0)
    } else {
        Duration::ZERO
    }
}
