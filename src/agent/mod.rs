//! Planner-driven agent: actions, their execution, the planner client and
//! the closed loop tying them together

pub mod action;
pub mod driver;
pub mod executor;
pub mod planner;

pub use action::{Action, ActionResult};
pub use driver::{AgentConfig, AgentLoop, AgentRunReport, StopReason};
pub use executor::ActionExecutor;
pub use planner::{HistoryEntry, HttpPlanner, PlanRequest, PlanResponse, Planner};
