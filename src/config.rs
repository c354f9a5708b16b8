//! Engine tuning configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for a try-on session.
///
/// Defaults match the reference overlays; every field is a free parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Landmarks below this confidence are treated as missing.
    pub confidence_floor: f32,
    /// How long a stale landmark set may be reused when the tracker
    /// misses a frame, in milliseconds.
    pub landmark_reuse_ms: u64,
    /// Exponential smoothing factor for 3D model anchors; 0 disables.
    pub smoothing_alpha: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.6,
            landmark_reuse_ms: 300,
            smoothing_alpha: 0.35,
        }
    }
}

impl EngineConfig {
    pub fn reuse_window(&self) -> Duration {
        Duration::from_millis(self.landmark_reuse_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.confidence_floor, 0.6);
        assert_eq!(config.reuse_window(), Duration::from_millis(300));
        assert_eq!(config.smoothing_alpha, 0.35);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str("{\"confidence_floor\":0.5}").unwrap();
        assert_eq!(config.confidence_floor, 0.5);
        assert_eq!(config.landmark_reuse_ms, 300);
    }
}
