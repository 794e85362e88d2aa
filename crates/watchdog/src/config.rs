//! Watchdog configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::threshold::AlertThreshold;

/// How often a stalled task is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringMode {
    /// Fire on every tick while the silence lasts
    #[default]
    EveryTick,
    /// Fire once per stall; re-arm after a tick sees the task alive again
    OncePerStall,
}

/// Serializable watchdog settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    pub alert_threshold_ms: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub firing_mode: FiringMode,
}

impl WatchdogConfig {
    pub fn new(alert_threshold_ms: u64) -> Self {
        Self {
            alert_threshold_ms,
            name: String::new(),
            firing_mode: FiringMode::default(),
        }
    }

    /// Parse from JSON. Threshold validity is checked separately by `threshold()`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn threshold(&self) -> Result<AlertThreshold> {
        AlertThreshold::from_millis(self.alert_threshold_ms)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::new(5_000)
    }
}
