//! Flow execution
//!
//! Runs classified steps one after another against the live page, pausing
//! between steps so page transitions can finish. Cancellation is checked
//! only at step boundaries; a step already dispatched runs to completion.

use super::state::FlowState;
use super::steps::{classify, StepKind};
use crate::config::EngineConfig;
use crate::dom::{display_text, is_search_field, is_watch_link};
use crate::interact::{press_enter, type_into};
use crate::locate::resolver::read_nodes;
use crate::locate::{extract_query, find_best_with_retry, rank, RetryPolicy};
use crate::overlay::GuideOverlay;
use crate::page::{host_of, NodeQuery, PageContext, RawNode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fallback anchors considered when a page has no titled video links
const MAX_FALLBACK_VIDEOS: usize = 20;

/// Pause between guiding to the search box and typing
const SEARCH_FOCUS_SETTLE: Duration = Duration::from_millis(200);

/// Pause between typing the search text and submitting it
const SEARCH_SUBMIT_DELAY: Duration = Duration::from_millis(150);

/// Why a single step failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("No search box found on this page.")]
    NoSearchBox,

    #[error("No videos found to play.")]
    NoVideos,

    #[error("No matching element found for: \"{used_query}\"")]
    NoMatch { used_query: String },

    #[error("Click failed.")]
    ClickFailed,

    #[error("Typing failed.")]
    TypingFailed,
}

/// What a text lookup matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickReport {
    pub target_text: String,
    pub used_query: String,
}

/// How a flow ended. Partial progress is always carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed {
        completed: usize,
        total: usize,
    },
    Failed {
        /// 1-based index of the failing step; `None` when nothing ran
        step: Option<usize>,
        message: String,
        completed: usize,
        total: usize,
    },
    Cancelled {
        completed: usize,
        total: usize,
    },
    AlreadyRunning,
}

impl FlowOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, FlowOutcome::Completed { .. })
    }

    pub fn message(&self) -> Option<String> {
        match self {
            FlowOutcome::Completed { .. } => None,
            FlowOutcome::Failed { message, .. } => Some(message.clone()),
            FlowOutcome::Cancelled { .. } => Some("Flow cancelled.".to_string()),
            FlowOutcome::AlreadyRunning => Some("Already running a flow.".to_string()),
        }
    }
}

/// Executes flows against one page
pub struct FlowRunner<P: PageContext> {
    page: Arc<P>,
    overlay: GuideOverlay<P>,
    config: Arc<EngineConfig>,
    state: FlowState,
}

impl<P: PageContext> FlowRunner<P> {
    pub fn new(page: Arc<P>, overlay: GuideOverlay<P>, config: Arc<EngineConfig>) -> Self {
        Self {
            page,
            overlay,
            config,
            state: FlowState::new(),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Ask a running flow to stop before its next step
    pub fn cancel(&self) {
        self.state.request_cancel();
    }

    /// Run `steps` in order. A second call while one is in progress is
    /// rejected without touching the running flow.
    pub async fn run_flow(&self, steps: &[String], auto_click: bool) -> FlowOutcome {
        let Some(_guard) = self.state.try_start() else {
            log::info!("Flow rejected: another flow is running");
            return FlowOutcome::AlreadyRunning;
        };

        let total = steps.len();
        if total == 0 {
            return FlowOutcome::Failed {
                step: None,
                message: "No steps found.".to_string(),
                completed: 0,
                total: 0,
            };
        }

        log::info!("Starting flow with {} step(s)", total);
        let mut completed = 0;

        for (index, step) in steps.iter().enumerate() {
            if self.state.is_cancelled() {
                log::info!("Flow cancelled after {}/{} step(s)", completed, total);
                return FlowOutcome::Cancelled { completed, total };
            }

            let kind = classify(step, self.on_media_host().await);
            log::info!("Step {}/{} ({}): {}", index + 1, total, kind.name(), step);

            let settle = match self.run_step(&kind, auto_click).await {
                Ok(settle) => settle,
                Err(e) => {
                    log::warn!("Step {} failed: {}", index + 1, e);
                    return FlowOutcome::Failed {
                        step: Some(index + 1),
                        message: e.to_string(),
                        completed,
                        total,
                    };
                }
            };

            completed += 1;
            tokio::time::sleep(settle).await;
        }

        log::info!("Flow completed: {}/{}", completed, total);
        FlowOutcome::Completed { completed, total }
    }

    /// Dispatch one step; returns the settle delay to observe afterwards
    async fn run_step(&self, kind: &StepKind, auto_click: bool) -> Result<Duration, StepError> {
        match kind {
            StepKind::Search(text) => {
                self.search(text).await?;
                Ok(self.config.media_settle())
            }
            StepKind::Play(query) => {
                self.play(query).await?;
                Ok(self.config.media_settle())
            }
            StepKind::Click(step) => {
                self.click_by_text(step, auto_click, self.config.flow_step_timeout())
                    .await?;
                Ok(self.config.click_settle())
            }
        }
    }

    async fn on_media_host(&self) -> bool {
        match self.page.location().await {
            Ok(location) => self.config.is_media_host(&host_of(&location)),
            Err(e) => {
                log::debug!("Could not read page location: {}", e);
                false
            }
        }
    }

    /// Type `text` into the page's search box and submit it
    pub async fn search(&self, text: &str) -> Result<(), StepError> {
        let field = read_nodes(self.page.as_ref(), &NodeQuery::TextFields)
            .await
            .into_iter()
            .find(is_search_field)
            .ok_or(StepError::NoSearchBox)?;

        let message = format!("Typing: \"{}\"", text);
        if !self.overlay.guide_to(field.node, &message, true).await {
            log::debug!("Focusing click on the search box failed; typing anyway");
        }
        tokio::time::sleep(SEARCH_FOCUS_SETTLE).await;

        if !type_into(self.page.as_ref(), field.node, text).await {
            return Err(StepError::TypingFailed);
        }
        tokio::time::sleep(SEARCH_SUBMIT_DELAY).await;
        press_enter(self.page.as_ref(), field.node).await;
        Ok(())
    }

    /// Pick and open a video: "second" and "recent"/"latest" select by
    /// position, anything else by text, falling back to the first video
    pub async fn play(&self, query: &str) -> Result<(), StepError> {
        let videos = self.video_links().await;
        if videos.is_empty() {
            return Err(StepError::NoVideos);
        }

        let lower = query.to_lowercase();
        let chosen: &RawNode = if lower.contains("second") {
            videos.get(1).unwrap_or(&videos[0])
        } else if lower.contains("recent") || lower.contains("latest") {
            &videos[0]
        } else {
            let ranked = rank(
                query,
                videos.iter().map(|v| (v.node, display_text(v))),
            );
            ranked
                .first()
                .filter(|best| best.score > 0)
                .and_then(|best| videos.iter().find(|v| v.node == best.node))
                .unwrap_or(&videos[0])
        };

        let message = format!("Playing: \"{}\"", display_text(chosen));
        if !self.overlay.guide_to(chosen.node, &message, true).await {
            return Err(StepError::ClickFailed);
        }
        Ok(())
    }

    async fn video_links(&self) -> Vec<RawNode> {
        let page = self.page.as_ref();
        let titled: Vec<RawNode> = read_nodes(page, &NodeQuery::VideoTitles)
            .await
            .into_iter()
            .filter(is_watch_link)
            .collect();
        if !titled.is_empty() {
            return titled;
        }

        read_nodes(page, &NodeQuery::Anchors)
            .await
            .into_iter()
            .filter(is_watch_link)
            .take(MAX_FALLBACK_VIDEOS)
            .collect()
    }

    /// Normalize `raw`, resolve it within `timeout` and guide to the match,
    /// clicking when `auto_click` is set
    pub async fn click_by_text(
        &self,
        raw: &str,
        auto_click: bool,
        timeout: Duration,
    ) -> Result<ClickReport, StepError> {
        let used_query = extract_query(raw);
        let policy = RetryPolicy::new(self.config.poll_interval(), timeout);

        let best = find_best_with_retry(self.page.as_ref(), &used_query, policy)
            .await
            .ok_or_else(|| StepError::NoMatch {
                used_query: used_query.clone(),
            })?;

        let message = format!("Click: \"{}\"", best.text);
        if !self.overlay.guide_to(best.node, &message, auto_click).await {
            return Err(StepError::ClickFailed);
        }

        Ok(ClickReport {
            target_text: best.text,
            used_query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{MemoryPage, PageEvent};

    fn runner(page: &Arc<MemoryPage>) -> FlowRunner<MemoryPage> {
        let config = Arc::new(EngineConfig::default());
        let overlay = GuideOverlay::new(page.clone(), config.overlay.clone());
        FlowRunner::new(page.clone(), overlay, config)
    }

    fn steps(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_flow_fails() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        let outcome = runner(&page).run_flow(&[], true).await;
        assert_eq!(outcome.message().as_deref(), Some("No steps found."));
        assert!(!outcome.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_without_box_reports_step() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        page.add(RawNode::element("a").text("Home"));

        let outcome = runner(&page)
            .run_flow(&steps(&["home", "search for cats"]), true)
            .await;
        assert_eq!(
            outcome,
            FlowOutcome::Failed {
                step: Some(2),
                message: "No search box found on this page.".into(),
                completed: 1,
                total: 2,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_picks_second_video() {
        let page = Arc::new(MemoryPage::new("https://www.youtube.com/"));
        page.add(RawNode::element("a").id("video-title").text("One").href("/watch?v=1"));
        let second = page.add(RawNode::element("a").id("video-title").text("Two").href("/watch?v=2"));

        let outcome = runner(&page).run_flow(&steps(&["play the second video"]), false).await;
        assert!(outcome.is_ok());
        assert_eq!(page.clicks(), vec![second]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_matches_text_then_falls_back_to_first() {
        let page = Arc::new(MemoryPage::new("https://www.youtube.com/feed"));
        let first = page.add(RawNode::element("a").text("Cooking basics").href("/watch?v=1"));
        let review = page.add(RawNode::element("a").text("Phone review").href("/watch?v=2"));
        page.add(RawNode::element("a").text("Channel").href("/channel/x"));

        let runner = runner(&page);
        runner.play("phone review").await.unwrap();
        runner.play("zzz").await.unwrap();
        assert_eq!(page.clicks(), vec![review, first]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_without_videos_fails() {
        let page = Arc::new(MemoryPage::new("https://www.youtube.com/"));
        page.add(RawNode::element("a").text("Channel").href("/channel/x"));
        assert_eq!(runner(&page).play("anything").await, Err(StepError::NoVideos));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_off_media_host_is_a_click() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        let link = page.add(RawNode::element("a").text("MKBHD channel"));

        let outcome = runner(&page).run_flow(&steps(&["play MKBHD"]), true).await;
        assert!(outcome.is_ok());
        assert_eq!(page.clicks(), vec![link]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_reports_used_query() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        let sub = page.add(RawNode::element("a").text("Subscriptions"));

        let runner = runner(&page);
        let report = runner
            .click_by_text("go to subscriptions", false, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(report.used_query, "subscriptions");
        assert_eq!(report.target_text, "Subscriptions");
        assert!(page.clicks().is_empty());
        assert!(page
            .events()
            .contains(&PageEvent::ScrolledIntoView(sub)));

        let missing = runner
            .click_by_text("open billing", false, Duration::from_millis(500))
            .await;
        assert_eq!(
            missing,
            Err(StepError::NoMatch {
                used_query: "billing".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_at_next_step() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        page.add(RawNode::element("a").text("Home"));
        page.add(RawNode::element("a").text("About"));

        let runner = Arc::new(runner(&page));
        let handle = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run_flow(&steps(&["home", "about"]), true).await })
        };

        // First step clicks after ~630ms of guide delays, then settles 700ms
        tokio::time::sleep(Duration::from_millis(900)).await;
        runner.cancel();

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, FlowOutcome::Cancelled { completed: 1, total: 2 });
        assert_eq!(outcome.message().as_deref(), Some("Flow cancelled."));
        assert!(!runner.state().is_running());
        assert!(!runner.state().is_cancelled());
    }
}
