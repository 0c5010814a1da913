//! Guide and flow behaviour through the public engine API, against the
//! in-memory page

use guide_webdriver::page::PageEvent;
use guide_webdriver::{EngineConfig, FlowOutcome, GuideEngine, MemoryPage, RawNode};
use std::sync::Arc;
use std::time::Duration;

fn engine(page: &Arc<MemoryPage>) -> Arc<GuideEngine<MemoryPage>> {
    Arc::new(GuideEngine::new(page.clone(), EngineConfig::default()))
}

fn steps(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_single_step_search_flow() {
    let page = Arc::new(MemoryPage::new("https://example.com/"));
    page.add(RawNode::element("a").text("Home"));
    let search = page.add(RawNode::element("input").input_type("text").placeholder("Search").value(""));

    let engine = engine(&page);
    let outcome = engine.flow(&steps(&["search for bengal famine"]), true).await;

    assert_eq!(outcome, FlowOutcome::Completed { completed: 1, total: 1 });
    assert_eq!(page.value_of(search).as_deref(), Some("bengal famine"));

    let events = page.events();
    let assigned = events
        .iter()
        .position(|e| {
            *e == PageEvent::ValueAssigned {
                node: search,
                value: "bengal famine".into(),
            }
        })
        .expect("query typed into the search box");
    let entered = events
        .iter()
        .position(|e| *e == PageEvent::EnterPressed(search))
        .expect("enter pressed");
    assert!(assigned < entered);
}

#[tokio::test(start_paused = true)]
async fn test_second_flow_rejected_while_running() {
    let page = Arc::new(MemoryPage::new("https://example.com/"));
    page.add(RawNode::element("a").text("Library"));
    page.add(RawNode::element("a").text("History"));

    let engine = engine(&page);
    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.flow(&steps(&["library", "history"]), true).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(engine.flows().state().is_running());

    let second = engine.flow(&steps(&["library"]), true).await;
    assert_eq!(second, FlowOutcome::AlreadyRunning);
    assert_eq!(second.message().as_deref(), Some("Already running a flow."));

    // The rejected request leaves the running flow untouched
    let outcome = first.await.unwrap();
    assert_eq!(outcome, FlowOutcome::Completed { completed: 2, total: 2 });
    assert_eq!(page.clicks().len(), 2);
    assert!(!engine.flows().state().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_clear_stops_running_flow() {
    let page = Arc::new(MemoryPage::new("https://example.com/"));
    page.add(RawNode::element("a").text("Library"));
    page.add(RawNode::element("a").text("History"));
    page.add(RawNode::element("a").text("Downloads"));

    let engine = engine(&page);
    let run = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .flow(&steps(&["library", "history", "downloads"]), true)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(900)).await;
    engine.clear().await;

    let outcome = run.await.unwrap();
    assert!(matches!(outcome, FlowOutcome::Cancelled { total: 3, .. }));
    assert_eq!(outcome.message().as_deref(), Some("Flow cancelled."));
    assert!(!engine.overlay().is_active().await);
}

#[tokio::test(start_paused = true)]
async fn test_clear_without_session_is_noop() {
    let page = Arc::new(MemoryPage::new("https://example.com/"));
    let engine = engine(&page);

    engine.clear().await;
    engine.clear().await;

    assert!(!engine.overlay().is_active().await);
    assert!(page.clicks().is_empty());
    assert!(!page.overlay_mounted());
}

#[tokio::test(start_paused = true)]
async fn test_guide_waits_for_late_content() {
    let page = Arc::new(MemoryPage::new("https://example.com/"));
    let engine = engine(&page);

    let late = {
        let page = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            page.add(RawNode::element("button").text("Accept cookies"))
        })
    };

    let outcome = engine.guide("click accept cookies", false).await;
    let button = late.await.unwrap();

    assert!(outcome.ok);
    assert_eq!(outcome.target_text.as_deref(), Some("Accept cookies"));
    assert_eq!(engine.overlay().target().await, Some(button));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_step_reports_position() {
    let page = Arc::new(MemoryPage::new("https://example.com/"));
    page.add(RawNode::element("a").text("Library"));

    let engine = engine(&page);
    let outcome = engine
        .flow(&steps(&["library", "open the vault", "library"]), true)
        .await;

    assert_eq!(
        outcome,
        FlowOutcome::Failed {
            step: Some(2),
            message: "No matching element found for: \"vault\"".into(),
            completed: 1,
            total: 3,
        }
    );
}
