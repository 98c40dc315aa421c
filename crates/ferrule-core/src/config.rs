use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths::FerrulePaths;

/// Keys accepted in `.ferrule/config.json`.
pub const CONFIG_KEYS: &[&str] = &["ide", "wait_for_completion", "operation_timeout_ms", "body_limit_mb"];

/// Server settings stored in `.ferrule/config.json`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FerruleConfig {
    /// IDE identifier advertised in the discovery record.
    pub ide: String,
    /// Answer after the handler finished instead of right after dispatch.
    pub wait_for_completion: bool,
    /// Upper bound for a single host save or native undo/redo.
    pub operation_timeout_ms: u64,
    pub body_limit_mb: usize,
}

impl Default for FerruleConfig {
    fn default() -> Self {
        Self {
            ide: "ferrule".to_string(),
            wait_for_completion: true,
            operation_timeout_ms: 30_000,
            body_limit_mb: 50,
        }
    }
}

impl FerruleConfig {
    /// Load from `.ferrule/config.json`.
    /// Returns defaults if the file is missing or unparseable.
    pub fn load(paths: &FerrulePaths) -> Self {
        let content = match std::fs::read_to_string(&paths.config_json) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %paths.config_json.display(),
                    error = %e,
                    "ignoring unreadable config"
                );
                Self::default()
            }
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms.max(1))
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.max(1).saturating_mul(1024 * 1024)
    }
}
