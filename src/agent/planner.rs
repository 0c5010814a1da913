//! Planner client
//!
//! The planner is an external service that, given the goal, the current
//! observation and recent history, picks the next action. Its responses
//! are model output, so they are parsed tolerantly and never stall the loop.

use super::action::{Action, ActionResult, DEFAULT_WAIT_MS};
use crate::error::{GuideError, Result};
use crate::observation::Observation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// One executed step as the planner sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: Action,
    pub result: ActionResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest<'a> {
    pub goal: &'a str,
    pub observation: &'a Observation,
    pub history: &'a [HistoryEntry],
    pub model: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanResponse {
    pub ok: bool,
    pub action: Action,
    pub error: Option<String>,
}

impl PlanResponse {
    /// Safe default for anything the planner got wrong
    pub fn malformed(error: &str) -> Self {
        Self {
            ok: false,
            action: Action::wait(DEFAULT_WAIT_MS, error),
            error: Some(error.to_string()),
        }
    }
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &PlanRequest<'_>) -> Result<PlanResponse>;
}

/// Planner reached over HTTP at `{base_url}/plan`
pub struct HttpPlanner {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPlanner {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| GuideError::Planner(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Planner for HttpPlanner {
    async fn plan(&self, request: &PlanRequest<'_>) -> Result<PlanResponse> {
        let url = format!("{}/plan", self.base_url);
        log::debug!("Requesting plan from {}", url);

        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| GuideError::Planner(format!("Planner not reachable at {}: {}", url, e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GuideError::Planner(format!("Failed to read planner response: {}", e)))?;

        if !status.is_success() {
            let detail = if body.trim().is_empty() {
                format!("Server error {}", status)
            } else {
                body
            };
            return Err(GuideError::Planner(detail));
        }

        Ok(parse_plan_response(&body))
    }
}

/// Interpret a planner body. Accepts `{ok, action, error}` or a bare action,
/// possibly wrapped in surrounding text; anything else is a wait.
pub fn parse_plan_response(body: &str) -> PlanResponse {
    let Some(json) = extract_first_json_object(body) else {
        return PlanResponse::malformed("No JSON returned.");
    };
    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Planner returned invalid JSON: {}", e);
            return PlanResponse::malformed("Invalid JSON returned.");
        }
    };

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string);
    let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(true);
    let action = match value.get("action") {
        Some(action) => Action::from_value(action),
        None => Action::from_value(&value),
    };

    PlanResponse { ok, action, error }
}

/// First balanced `{...}` in `text`, skipping braces inside strings
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
