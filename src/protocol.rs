//! Request/response messages
//!
//! Requests are JSON objects tagged by `type`. Every response carries at
//! least `ok`; unrecognized requests get `{ok:false, message:"Unknown request"}`.

use crate::agent::{Action, ActionResult};
use crate::engine::{GuideEngine, GuideOutcome, InstructOutcome};
use crate::flow::{split_steps, FlowOutcome};
use crate::observation::Observation;
use crate::page::PageContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flow steps as a list, or as one instruction to split
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StepsInput {
    List(Vec<String>),
    Text(String),
}

impl StepsInput {
    pub fn into_steps(self) -> Vec<String> {
        match self {
            StepsInput::List(steps) => steps,
            StepsInput::Text(raw) => split_steps(&raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    Ping,
    GetObservation {
        #[serde(default, rename = "maxElements")]
        max_elements: Option<usize>,
    },
    AgentExecute {
        #[serde(default)]
        action: Value,
    },
    ClearGuide,
    CancelFlow,
    Guide {
        #[serde(default)]
        query: String,
        #[serde(default, rename = "autoClick")]
        auto_click: bool,
    },
    Flow {
        #[serde(default)]
        steps: Option<StepsInput>,
        #[serde(default)]
        query: Option<String>,
        #[serde(default, rename = "autoClick")]
        auto_click: bool,
    },
    Instruct {
        #[serde(default)]
        query: String,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<Observation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

impl From<GuideOutcome> for Response {
    fn from(outcome: GuideOutcome) -> Self {
        Self {
            ok: outcome.ok,
            message: outcome.message,
            target_text: outcome.target_text,
            used_query: outcome.used_query,
            ..Default::default()
        }
    }
}

impl From<FlowOutcome> for Response {
    fn from(outcome: FlowOutcome) -> Self {
        let message = outcome.message();
        match outcome {
            FlowOutcome::Completed { completed, total } => Self {
                ok: true,
                mode: Some("flow".to_string()),
                completed: Some(completed),
                total: Some(total),
                ..Default::default()
            },
            FlowOutcome::Failed {
                step,
                completed,
                total,
                ..
            } => Self {
                ok: false,
                message,
                step,
                completed: Some(completed),
                total: Some(total),
                ..Default::default()
            },
            FlowOutcome::Cancelled { completed, total } => Self {
                ok: false,
                message,
                completed: Some(completed),
                total: Some(total),
                ..Default::default()
            },
            FlowOutcome::AlreadyRunning => Self {
                ok: false,
                message,
                ..Default::default()
            },
        }
    }
}

/// Parse and dispatch one raw message
pub async fn handle_value<P: PageContext>(engine: &GuideEngine<P>, message: &Value) -> Response {
    match serde_json::from_value::<Request>(message.clone()) {
        Ok(request) => handle(engine, request).await,
        Err(e) => {
            log::debug!("Rejected message {}: {}", message, e);
            Response::error("Unknown request")
        }
    }
}

pub async fn handle<P: PageContext>(engine: &GuideEngine<P>, request: Request) -> Response {
    match request {
        Request::Ping => Response::ok(),

        Request::GetObservation { max_elements } => match engine.observation(max_elements).await {
            Ok(observation) => Response {
                ok: true,
                observation: Some(observation),
                ..Default::default()
            },
            Err(e) => {
                log::warn!("Observation failed: {}", e);
                Response::error(format!("Failed to get observation: {}", e))
            }
        },

        Request::AgentExecute { action } => {
            let action = Action::from_value(&action);
            Response {
                ok: true,
                result: Some(engine.execute(&action).await),
                ..Default::default()
            }
        }

        Request::ClearGuide => {
            engine.clear().await;
            Response::ok()
        }

        Request::CancelFlow => {
            engine.cancel_flow();
            Response::ok()
        }

        Request::Guide { query, auto_click } => engine.guide(&query, auto_click).await.into(),

        Request::Flow {
            steps,
            query,
            auto_click,
        } => {
            // Blank or empty steps fall back to the query
            let steps = match steps.map(StepsInput::into_steps).filter(|s| !s.is_empty()) {
                Some(steps) => steps,
                None => query.map(|q| split_steps(&q)).unwrap_or_default(),
            };
            engine.flow(&steps, auto_click).await.into()
        }

        Request::Instruct { query } => match engine.instruct(&query).await {
            InstructOutcome::Guide(outcome) => outcome.into(),
            InstructOutcome::Flow(outcome) => outcome.into(),
        },
    }
}
