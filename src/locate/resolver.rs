//! Element resolution
//!
//! Turns a [`Locator`] or free-text query into one live element.

use super::query::extract_query;
use super::scorer::{rank, ScoredCandidate};
use crate::dom::{display_text, is_clickable, is_visible};
use crate::page::{NodeQuery, NodeRef, NodeSnapshot, PageContext, RawNode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Selector and/or free text identifying an element; the selector is tried first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Locator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Locator {
    pub fn selector(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            text: None,
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            selector: None,
            text: Some(text.to_string()),
        }
    }
}

/// Polling schedule for content that may still be loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Delay before the next attempt, or `None` once the window is spent.
    /// The first attempt runs immediately.
    pub fn next_delay(&self, attempts_made: u32, elapsed: Duration) -> Option<Duration> {
        if elapsed >= self.timeout {
            return None;
        }
        if attempts_made == 0 {
            Some(Duration::ZERO)
        } else {
            Some(self.interval)
        }
    }
}

/// Readable nodes for `query`; failures to read one element are skipped
pub(crate) async fn read_nodes<P: PageContext + ?Sized>(page: &P, query: &NodeQuery) -> Vec<RawNode> {
    match page.query_nodes(query).await {
        Ok(snapshots) => snapshots
            .into_iter()
            .filter_map(|s| match s {
                NodeSnapshot::Read(node) => Some(node),
                NodeSnapshot::Unreadable { .. } => None,
            })
            .collect(),
        Err(e) => {
            log::warn!("Element query '{}' failed: {}", query.css(), e);
            Vec::new()
        }
    }
}

/// Resolve a locator. A live selector match wins outright; otherwise the
/// normalized text is scored against visible click targets and the top
/// candidate is returned whatever its score.
pub async fn resolve<P: PageContext + ?Sized>(page: &P, locator: &Locator) -> Option<NodeRef> {
    if let Some(selector) = locator.selector.as_deref().filter(|s| !s.trim().is_empty()) {
        let matched = read_nodes(page, &NodeQuery::Selector(selector.to_string())).await;
        if let Some(node) = matched.first() {
            return Some(node.node);
        }
        log::debug!("Selector '{}' matched nothing, trying text", selector);
    }

    let text = locator.text.as_deref().unwrap_or("").trim();
    if text.is_empty() {
        return None;
    }
    let query = extract_query(text);

    let candidates = read_nodes(page, &NodeQuery::Clickable)
        .await
        .into_iter()
        .filter(is_visible)
        .map(|node| (node.node, display_text(&node)))
        .filter(|(_, text)| !text.is_empty());

    rank(&query, candidates).into_iter().next().map(|c| c.node)
}

/// Best clickable element whose text scores above zero for `query`
pub async fn find_best<P: PageContext + ?Sized>(page: &P, query: &str) -> Option<ScoredCandidate> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    let candidates = read_nodes(page, &NodeQuery::Clickable)
        .await
        .into_iter()
        .filter(is_clickable)
        .map(|node| (node.node, display_text(&node)))
        .filter(|(_, text)| !text.is_empty());

    rank(query, candidates).into_iter().find(|c| c.score > 0)
}

/// [`find_best`], polled until it succeeds or the policy's window closes
pub async fn find_best_with_retry<P: PageContext + ?Sized>(
    page: &P,
    query: &str,
    policy: RetryPolicy,
) -> Option<ScoredCandidate> {
    let started = Instant::now();
    let mut attempts = 0;

    while let Some(delay) = policy.next_delay(attempts, started.elapsed()) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(best) = find_best(page, query).await {
            log::debug!(
                "Resolved '{}' to '{}' (score {}) after {} attempt(s)",
                query,
                best.text,
                best.score,
                attempts + 1
            );
            return Some(best);
        }
        attempts += 1;
    }

    log::info!(
        "No element matched '{}' within {:?} ({} attempts)",
        query,
        policy.timeout,
        attempts
    );
    None
}
