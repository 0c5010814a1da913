//! Engine configuration
//!
//! Every tunable the engine uses lives here with its default. The binary
//! builds an [`EngineConfig`] from defaults, an optional JSON file and its
//! command-line flags.

use crate::error::{GuideError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for a [`GuideEngine`](crate::engine::GuideEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum number of elements in an observation
    pub max_elements: usize,

    /// Resolve window for a single guide request
    pub guide_timeout_ms: u64,

    /// Resolve window for each generic click step of a flow
    pub flow_step_timeout_ms: u64,

    /// Polling interval while waiting for late content
    pub poll_interval_ms: u64,

    /// Pause after a search or play step
    pub media_settle_ms: u64,

    /// Pause after a generic click step
    pub click_settle_ms: u64,

    /// Hosts on which "play/open/watch" steps pick video links
    pub media_hosts: Vec<String>,

    /// Overlay geometry
    pub overlay: OverlayConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_elements: 60,
            guide_timeout_ms: 2000,
            flow_step_timeout_ms: 2500,
            poll_interval_ms: 250,
            media_settle_ms: 800,
            click_settle_ms: 700,
            media_hosts: vec!["youtube.com".to_string()],
            overlay: OverlayConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file; missing fields keep their defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            GuideError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            GuideError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_elements == 0 {
            return Err(GuideError::Config("maxElements must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(GuideError::Config("pollIntervalMs must be positive".into()));
        }
        if self.overlay.label_width <= 0.0 || self.overlay.label_height <= 0.0 {
            return Err(GuideError::Config("label size must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn guide_timeout(&self) -> Duration {
        Duration::from_millis(self.guide_timeout_ms)
    }

    pub fn flow_step_timeout(&self) -> Duration {
        Duration::from_millis(self.flow_step_timeout_ms)
    }

    pub fn media_settle(&self) -> Duration {
        Duration::from_millis(self.media_settle_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    /// Whether `host` belongs to one of the configured media hosts
    pub fn is_media_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.media_hosts
            .iter()
            .any(|m| host.contains(&m.to_lowercase()))
    }
}

/// Geometry constants for the guide overlay (pixels)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayConfig {
    pub highlight_padding: f64,
    pub label_margin: f64,
    pub viewport_inset: f64,
    pub label_width: f64,
    pub label_height: f64,
    pub min_pointer_length: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            highlight_padding: 6.0,
            label_margin: 14.0,
            viewport_inset: 10.0,
            label_width: 320.0,
            label_height: 96.0,
            min_pointer_length: 40.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_elements, 60);
        assert_eq!(config.guide_timeout(), Duration::from_millis(2000));
        assert_eq!(config.flow_step_timeout(), Duration::from_millis(2500));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.overlay.label_width, 320.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"maxElements": 10, "overlay": {"labelWidth": 200}}"#)
                .unwrap();
        assert_eq!(config.max_elements, 10);
        assert_eq!(config.overlay.label_width, 200.0);
        assert_eq!(config.overlay.label_height, 96.0);
        assert_eq!(config.click_settle_ms, 700);
    }

    #[test]
    fn test_media_host_matching() {
        let config = EngineConfig::default();
        assert!(config.is_media_host("www.youtube.com"));
        assert!(config.is_media_host("WWW.YOUTUBE.COM"));
        assert!(!config.is_media_host("example.com"));
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = EngineConfig {
            max_elements: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        let result = EngineConfig::from_file(Path::new("does-not-exist.json")).await;
        assert!(matches!(result, Err(GuideError::Config(_))));
    }
}
