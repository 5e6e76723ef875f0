use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "OverlayConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "OverlayConfig::default_color")]
    pub color: String,
    #[serde(default = "OverlayConfig::default_font")]
    pub font: String,
}

impl OverlayConfig {
    const fn default_enabled() -> bool {
        false
    }

    fn default_color() -> String {
        "#00ff88".to_string()
    }

    fn default_font() -> String {
        "12px monospace".to_string()
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            color: Self::default_color(),
            font: Self::default_font(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Upper bound on a single frame delta, in seconds. Keeps a stalled host
    /// (breakpoint, minimized tab) from producing one catastrophic step.
    #[serde(default = "RuntimeConfig::default_max_delta")]
    pub max_delta: f32,
    #[serde(default = "RuntimeConfig::default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default)]
    pub overlay: OverlayConfig,
}

impl RuntimeConfig {
    const fn default_max_delta() -> f32 {
        0.25
    }

    const fn default_log_capacity() -> usize {
        512
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("[runtime] config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_delta: Self::default_max_delta(),
            log_capacity: Self::default_log_capacity(),
            overlay: OverlayConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(cfg.max_delta, 0.25);
        assert_eq!(cfg.log_capacity, 512);
        assert!(!cfg.overlay.enabled);
    }

    #[test]
    fn partial_overlay_keeps_remaining_defaults() {
        let cfg: RuntimeConfig =
            serde_json::from_str(r#"{"overlay": {"enabled": true}}"#).expect("parse overlay config");
        assert!(cfg.overlay.enabled);
        assert_eq!(cfg.overlay.color, "#00ff88");
        assert_eq!(cfg.overlay.font, "12px monospace");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = RuntimeConfig::load_or_default("definitely/not/here.json");
        assert_eq!(cfg.log_capacity, 512);
    }
}
