//! Planner actions
//!
//! One step chosen by the external planner. Payloads come from a language
//! model, so parsing is lenient: numbers may arrive as strings and an
//! unrecognized or malformed action becomes [`Action::Unknown`].

use crate::locate::Locator;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Pause used for `wait` without a duration and for unknown actions
pub const DEFAULT_WAIT_MS: f64 = 800.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Click {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Type {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default)]
        value: String,
        #[serde(default)]
        enter: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Scroll {
        #[serde(
            rename = "deltaY",
            default,
            deserialize_with = "lenient_number",
            skip_serializing_if = "Option::is_none"
        )]
        delta_y: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Wait {
        #[serde(
            default,
            deserialize_with = "lenient_number",
            skip_serializing_if = "Option::is_none"
        )]
        ms: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Parse a planner payload; anything that is not a recognizable action
    /// comes back as [`Action::Unknown`]
    pub fn from_value(value: &Value) -> Action {
        match serde_json::from_value(value.clone()) {
            Ok(action) => action,
            Err(e) => {
                log::warn!("Unrecognized action payload ({}): {}", e, value);
                Action::Unknown
            }
        }
    }

    pub fn wait(ms: f64, reason: &str) -> Action {
        Action::Wait {
            ms: Some(ms),
            reason: Some(reason.to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::Scroll { .. } => "scroll",
            Action::Wait { .. } => "wait",
            Action::Done { .. } => "done",
            Action::Unknown => "unknown",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Action::Done { .. })
    }

    /// Target of a click or type action
    pub fn locator(&self) -> Option<Locator> {
        match self {
            Action::Click { selector, text, .. } | Action::Type { selector, text, .. } => {
                Some(Locator {
                    selector: selector.clone(),
                    text: text.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Action::Click { reason, .. }
            | Action::Type { reason, .. }
            | Action::Scroll { reason, .. }
            | Action::Wait { reason, .. }
            | Action::Done { reason } => reason.as_deref().filter(|r| !r.is_empty()),
            Action::Unknown => None,
        }
    }
}

/// Accepts a number, a numeric string, or anything else as absent
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}

/// Outcome of executing one action
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub ok: bool,
    /// The page location changed while the action ran
    pub navigated: bool,
    pub message: String,
}

impl ActionResult {
    pub fn failed(message: &str) -> Self {
        Self {
            ok: false,
            navigated: false,
            message: message.to_string(),
        }
    }
}
