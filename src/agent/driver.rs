//! Closed-loop agent driver
//!
//! Observe, ask the planner for one action, execute it, remember the
//! outcome, repeat. The loop ends on `done`, a stop request, a failed
//! observation or plan, or when the step budget runs out.

use super::action::Action;
use super::planner::{HistoryEntry, PlanRequest, Planner};
use crate::engine::{GuideEngine, RESTRICTED_MESSAGE};
use crate::page::PageContext;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    pub max_steps: usize,
    /// Most recent steps sent back to the planner
    pub history_limit: usize,
    /// Pause between steps is `pause_min_ms + rand(0..pause_jitter_ms)`
    pub pause_min_ms: u64,
    pub pause_jitter_ms: u64,
    pub model: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 8,
            history_limit: 6,
            pause_min_ms: 600,
            pause_jitter_ms: 300,
            model: "llama3.1:8b".to_string(),
        }
    }
}

impl AgentConfig {
    fn pause(&self) -> Duration {
        let jitter = if self.pause_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.pause_jitter_ms)
        };
        Duration::from_millis(self.pause_min_ms + jitter)
    }
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum StopReason {
    /// The planner declared the goal complete
    Done,
    Stopped,
    Restricted,
    AlreadyRunning,
    ObservationFailed { error: String },
    PlannerFailed { error: String },
    MaxSteps,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRunReport {
    pub goal: String,
    #[serde(flatten)]
    pub stop: StopReason,
    /// Actions executed (a final `done` is not counted)
    pub steps: usize,
    pub history: Vec<HistoryEntry>,
    /// Human-readable progress lines
    pub log: Vec<String>,
}

/// Drives one engine with one planner
pub struct AgentLoop<P: PageContext, L: Planner> {
    engine: Arc<GuideEngine<P>>,
    planner: L,
    config: AgentConfig,
    running: AtomicBool,
    stop_requested: Arc<AtomicBool>,
}

impl<P: PageContext, L: Planner> AgentLoop<P, L> {
    pub fn new(engine: Arc<GuideEngine<P>>, planner: L, config: AgentConfig) -> Self {
        Self {
            engine,
            planner,
            config,
            running: AtomicBool::new(false),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked before each step; set it to stop a running loop
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_requested.clone()
    }

    pub async fn run(&self, goal: &str) -> AgentRunReport {
        let mut report = AgentRunReport {
            goal: goal.to_string(),
            stop: StopReason::MaxSteps,
            steps: 0,
            history: Vec::new(),
            log: vec![format!("Goal: {}", goal)],
        };

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            report.stop = StopReason::AlreadyRunning;
            report.note("Agent already running.");
            return report;
        }
        self.stop_requested.store(false, Ordering::SeqCst);

        let stop = self.drive(goal, &mut report).await;
        report.stop = stop;
        self.running.store(false, Ordering::SeqCst);
        log::info!("Agent run ended: {:?} after {} step(s)", report.stop, report.steps);
        report
    }

    async fn drive(&self, goal: &str, report: &mut AgentRunReport) -> StopReason {
        if self.engine.is_restricted().await {
            report.note(RESTRICTED_MESSAGE);
            return StopReason::Restricted;
        }

        let mut history: VecDeque<HistoryEntry> = VecDeque::new();

        for step in 1..=self.config.max_steps {
            if self.stop_requested.load(Ordering::SeqCst) {
                report.note("Stopped by user.");
                return StopReason::Stopped;
            }

            let observation = match self.engine.observation(None).await {
                Ok(observation) => observation,
                Err(e) => {
                    report.note("Failed to get observation.");
                    return StopReason::ObservationFailed {
                        error: e.to_string(),
                    };
                }
            };

            let recent: Vec<HistoryEntry> = history.iter().cloned().collect();
            let request = PlanRequest {
                goal,
                observation: &observation,
                history: &recent,
                model: &self.config.model,
            };
            let plan = match self.planner.plan(&request).await {
                Ok(plan) => plan,
                Err(e) => {
                    report.note(&format!("Planner error: {}", e));
                    return StopReason::PlannerFailed {
                        error: e.to_string(),
                    };
                }
            };
            if let Some(error) = plan.error.as_deref() {
                log::warn!("Planner reported: {}", error);
            }

            let action = plan.action;
            report.note(&format!(
                "Step {}: {}",
                step,
                serde_json::to_string(&action).unwrap_or_else(|_| action.kind().to_string())
            ));

            if let Action::Done { .. } = action {
                report.note("Agent finished.");
                return StopReason::Done;
            }

            let result = self.engine.execute(&action).await;
            report.steps += 1;

            let entry = HistoryEntry { action, result };
            report.history.push(entry.clone());
            history.push_back(entry);
            while history.len() > self.config.history_limit {
                history.pop_front();
            }

            tokio::time::sleep(self.config.pause()).await;
        }

        report.note("Stopped after max steps.");
        StopReason::MaxSteps
    }
}

impl AgentRunReport {
    fn note(&mut self, line: &str) {
        log::info!("{}", line);
        self.log.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::planner::PlanResponse;
    use crate::config::EngineConfig;
    use crate::error::{GuideError, Result};
    use crate::page::{MemoryPage, RawNode};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned actions and records how much history it was sent
    struct ScriptedPlanner {
        actions: Mutex<VecDeque<Action>>,
        history_lens: Mutex<Vec<usize>>,
    }

    impl ScriptedPlanner {
        fn new(actions: Vec<Action>) -> Self {
            Self {
                actions: Mutex::new(actions.into()),
                history_lens: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        async fn plan(&self, request: &PlanRequest<'_>) -> Result<PlanResponse> {
            self.history_lens.lock().unwrap().push(request.history.len());
            let next = self.actions.lock().unwrap().pop_front();
            next.map(|action| PlanResponse {
                ok: true,
                action,
                error: None,
            })
            .ok_or_else(|| GuideError::Planner("script exhausted".into()))
        }
    }

    fn engine(page: &Arc<MemoryPage>) -> Arc<GuideEngine<MemoryPage>> {
        Arc::new(GuideEngine::new(page.clone(), EngineConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_done() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        let link = page.add(RawNode::element("a").text("Docs"));

        let planner = ScriptedPlanner::new(vec![
            Action::Click {
                selector: None,
                text: Some("docs".into()),
                reason: None,
            },
            Action::Done { reason: None },
        ]);
        let agent = AgentLoop::new(engine(&page), planner, AgentConfig::default());
        let report = agent.run("read the docs").await;

        assert_eq!(report.stop, StopReason::Done);
        assert_eq!(report.steps, 1);
        assert_eq!(page.clicks(), vec![link]);
        assert_eq!(report.log.first().map(String::as_str), Some("Goal: read the docs"));
        assert_eq!(report.log.last().map(String::as_str), Some("Agent finished."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_bounded_and_budget_enforced() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        let waits = (0..10).map(|_| Action::wait(10.0, "thinking")).collect();
        let planner = ScriptedPlanner::new(waits);

        let agent = AgentLoop::new(engine(&page), planner, AgentConfig::default());
        let report = agent.run("loiter").await;

        assert_eq!(report.stop, StopReason::MaxSteps);
        assert_eq!(report.steps, 8);
        assert_eq!(
            *agent.planner.history_lens.lock().unwrap(),
            vec![0, 1, 2, 3, 4, 5, 6, 6]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_planner_failure_stops() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        let agent = AgentLoop::new(engine(&page), ScriptedPlanner::new(vec![]), AgentConfig::default());

        let report = agent.run("anything").await;
        assert!(matches!(report.stop, StopReason::PlannerFailed { .. }));
        assert_eq!(report.steps, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_restricted() {
        let page = Arc::new(MemoryPage::new("https://example.com/"));
        let planner = ScriptedPlanner::new(vec![Action::wait(10.0, "x"); 3]);
        let agent = Arc::new(AgentLoop::new(engine(&page), planner, AgentConfig::default()));

        let handle = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run("wait around").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        agent.stop_handle().store(true, Ordering::SeqCst);
        let report = handle.await.unwrap();
        assert_eq!(report.stop, StopReason::Stopped);
        assert_eq!(report.steps, 1);

        let restricted = Arc::new(MemoryPage::new("chrome-extension://abc/popup.html"));
        let agent = AgentLoop::new(engine(&restricted), ScriptedPlanner::new(vec![]), AgentConfig::default());
        assert_eq!(agent.run("x").await.stop, StopReason::Restricted);
    }
}
