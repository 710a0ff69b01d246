use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub share: ShareConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }
}

/// Configuration specific to the audio capture controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Derive each note's duration from the recording span instead of leaving
    /// it unknown.
    pub compute_duration: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            compute_duration: true,
        }
    }
}

/// Configuration for share links.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub state_param: String,
    pub video_param: String,
    /// Links longer than this still work in most browsers but are flagged.
    pub max_link_len: usize,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            state_param: "state".to_string(),
            video_param: "video".to_string(),
            max_link_len: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "share": { "max_link_len": 8000 } }"#).unwrap();

        assert_eq!(config.share.max_link_len, 8000);
        assert_eq!(config.share.state_param, "state");
        assert!(config.capture.compute_duration);
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!(
            "biomotion-config-{}.json",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::write(&path, r#"{ "capture": { "compute_duration": false } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(!config.capture.compute_duration);
        assert_eq!(config.share.video_param, "video");
    }
}
