//! Guide engine
//!
//! One [`GuideEngine`] serves one page: it owns the guide overlay, the flow
//! flags and the action executor, and exposes the operations the message
//! protocol maps onto. Every operation reports its outcome as a value.

use crate::agent::{Action, ActionExecutor, ActionResult};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::flow::{should_auto_click, split_steps, FlowOutcome, FlowRunner, StepError};
use crate::observation::{capture, Observation};
use crate::overlay::GuideOverlay;
use crate::page::{is_restricted_location, PageContext};
use serde::Serialize;
use std::sync::Arc;

pub const RESTRICTED_MESSAGE: &str = "This page is restricted. Open a normal website tab.";

/// Result of a single guide request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GuideOutcome {
    fn failed(message: String, used_query: Option<String>) -> Self {
        Self {
            ok: false,
            target_text: None,
            used_query,
            message: Some(message),
        }
    }
}

/// A raw instruction routed either to a guide or to a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructOutcome {
    Guide(GuideOutcome),
    Flow(FlowOutcome),
}

pub struct GuideEngine<P: PageContext> {
    page: Arc<P>,
    config: Arc<EngineConfig>,
    overlay: GuideOverlay<P>,
    flows: FlowRunner<P>,
    actions: ActionExecutor<P>,
}

impl<P: PageContext> GuideEngine<P> {
    pub fn new(page: Arc<P>, config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let overlay = GuideOverlay::new(page.clone(), config.overlay.clone());
        let flows = FlowRunner::new(page.clone(), overlay.clone(), config.clone());
        let actions = ActionExecutor::new(page.clone(), overlay.clone());

        Self {
            page,
            config,
            overlay,
            flows,
            actions,
        }
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn overlay(&self) -> &GuideOverlay<P> {
        &self.overlay
    }

    pub fn flows(&self) -> &FlowRunner<P> {
        &self.flows
    }

    /// Whether the current page refuses injected guidance
    pub async fn is_restricted(&self) -> bool {
        match self.page.location().await {
            Ok(location) => is_restricted_location(&location),
            Err(e) => {
                log::debug!("Could not read page location: {}", e);
                false
            }
        }
    }

    /// Snapshot of the page, capped at `max_elements` or the configured cap
    pub async fn observation(&self, max_elements: Option<usize>) -> Result<Observation> {
        capture(
            self.page.as_ref(),
            max_elements.unwrap_or(self.config.max_elements),
        )
        .await
    }

    /// Find the element `query` describes and point at it, clicking it
    /// when `auto_click` is set
    pub async fn guide(&self, query: &str, auto_click: bool) -> GuideOutcome {
        if self.is_restricted().await {
            return GuideOutcome::failed(RESTRICTED_MESSAGE.to_string(), None);
        }

        log::info!("Guide request: {:?} (auto click: {})", query, auto_click);
        match self
            .flows
            .click_by_text(query.trim(), auto_click, self.config.guide_timeout())
            .await
        {
            Ok(report) => GuideOutcome {
                ok: true,
                target_text: Some(report.target_text),
                used_query: Some(report.used_query),
                message: None,
            },
            Err(e) => {
                let used_query = match &e {
                    StepError::NoMatch { used_query } => Some(used_query.clone()),
                    _ => None,
                };
                GuideOutcome::failed(e.to_string(), used_query)
            }
        }
    }

    /// Run `steps` as a flow
    pub async fn flow(&self, steps: &[String], auto_click: bool) -> FlowOutcome {
        if self.is_restricted().await {
            return FlowOutcome::Failed {
                step: None,
                message: RESTRICTED_MESSAGE.to_string(),
                completed: 0,
                total: steps.len(),
            };
        }
        self.flows.run_flow(steps, auto_click).await
    }

    /// Route a raw instruction: several steps run as a flow, a single one
    /// as a guide. Auto-click follows the wording of the instruction.
    pub async fn instruct(&self, raw: &str) -> InstructOutcome {
        let steps = split_steps(raw);
        let auto_click = should_auto_click(raw);
        if steps.len() > 1 {
            InstructOutcome::Flow(self.flow(&steps, auto_click).await)
        } else {
            InstructOutcome::Guide(self.guide(raw, auto_click).await)
        }
    }

    /// Remove the overlay and ask any running flow to stop
    pub async fn clear(&self) {
        self.flows.cancel();
        self.overlay.clear_session().await;
    }

    pub fn cancel_flow(&self) {
        self.flows.cancel();
    }

    pub async fn execute(&self, action: &Action) -> ActionResult {
        self.actions.execute(action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{MemoryPage, RawNode};

    fn engine(location: &str) -> (Arc<MemoryPage>, GuideEngine<MemoryPage>) {
        let page = Arc::new(MemoryPage::new(location));
        let engine = GuideEngine::new(page.clone(), EngineConfig::default());
        (page, engine)
    }

    #[tokio::test(start_paused = true)]
    async fn test_guide_success_and_miss() {
        let (page, engine) = engine("https://example.com/");
        let billing = page.add(RawNode::element("a").text("Billing"));

        let outcome = engine.guide("open the billing page", true).await;
        assert!(outcome.ok);
        assert_eq!(outcome.target_text.as_deref(), Some("Billing"));
        assert_eq!(outcome.used_query.as_deref(), Some("billing"));
        assert_eq!(page.clicks(), vec![billing]);

        let miss = engine.guide("find invoices", false).await;
        assert!(!miss.ok);
        assert_eq!(miss.used_query.as_deref(), Some("invoices"));
        assert_eq!(
            miss.message.as_deref(),
            Some("No matching element found for: \"invoices\"")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restricted_page_refused() {
        let (page, engine) = engine("chrome://settings");
        page.add(RawNode::element("a").text("Privacy"));

        let outcome = engine.guide("privacy", true).await;
        assert_eq!(outcome.message.as_deref(), Some(RESTRICTED_MESSAGE));
        assert!(page.clicks().is_empty());

        let flow = engine.flow(&["privacy".to_string()], true).await;
        assert_eq!(flow.message().as_deref(), Some(RESTRICTED_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_instruct_routes_by_step_count() {
        let (page, engine) = engine("https://example.com/");
        page.add(RawNode::element("a").text("Library"));
        page.add(RawNode::element("a").text("History"));

        match engine.instruct("library").await {
            InstructOutcome::Guide(outcome) => assert!(outcome.ok),
            other => panic!("expected guide, got {:?}", other),
        }
        match engine.instruct("open library, then history").await {
            InstructOutcome::Flow(outcome) => {
                assert_eq!(outcome, FlowOutcome::Completed { completed: 2, total: 2 })
            }
            other => panic!("expected flow, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_observation_uses_configured_cap() {
        let (page, engine) = engine("https://example.com/");
        for i in 0..70 {
            page.add(RawNode::element("a").text("link").at(0.0, i as f64 * 30.0, 50.0, 20.0));
        }
        assert_eq!(engine.observation(None).await.unwrap().elements.len(), 60);
        assert_eq!(engine.observation(Some(5)).await.unwrap().elements.len(), 5);
    }
}
