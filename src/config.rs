// src/config.rs
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unknown palette '{0}'")]
    UnknownPalette(String),
}

/// Tunables for the whole pipeline. Defaults match the reference feel at
/// a 30 Hz detector and 60 Hz render tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// EMA coefficient applied to per-frame velocity deltas, strictly in (0, 1).
    pub velocity_smoothing: f64,
    /// Max center distance for matching a hand to its previous-frame slot.
    pub hand_match_distance: f64,
    /// Thumb-to-index fingertip distance below which a pinch is reported.
    pub pinch_threshold: f64,
    /// Vertical speed (normalized units/s) a swipe must exceed.
    pub swipe_velocity_threshold: f64,
    /// Seconds of vertical-center history kept for swipe consistency checks.
    pub swipe_window: f64,
    /// Minimum buffered samples before a swipe can be reported.
    pub swipe_min_samples: usize,
    /// Minimum milliseconds between two accepted step-gesture mutations.
    pub cooldown_ms: u64,
    pub yaw_sensitivity: f64,
    pub pitch_sensitivity: f64,
    /// Depth target speed (units/s) while a fist or open palm is held.
    pub zoom_speed: f64,
    pub depth_min: f64,
    pub depth_max: f64,
    pub initial_depth: f64,
    /// Half-life (s) of the orientation interpolation toward its target.
    pub orientation_half_life: f64,
    /// Half-life (s) of the depth interpolation toward its target.
    pub depth_half_life: f64,
    /// Scale applied to smoothed hand velocity when deriving force vectors.
    pub force_gain: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            velocity_smoothing: 0.35,
            hand_match_distance: 0.25,
            pinch_threshold: 0.05,
            swipe_velocity_threshold: 0.9,
            swipe_window: 0.25,
            swipe_min_samples: 3,
            cooldown_ms: 400,
            yaw_sensitivity: 2.4,
            pitch_sensitivity: 1.6,
            zoom_speed: 2.0,
            depth_min: 1.2,
            depth_max: 7.0,
            initial_depth: 3.5,
            orientation_half_life: 0.12,
            depth_half_life: 0.18,
            force_gain: 1.0,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConductorError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConductorError> {
        if !(self.velocity_smoothing > 0.0 && self.velocity_smoothing < 1.0) {
            return Err(ConductorError::InvalidConfig(format!(
                "velocity_smoothing must be in (0, 1), got {}",
                self.velocity_smoothing
            )));
        }
        if self.depth_min >= self.depth_max {
            return Err(ConductorError::InvalidConfig(format!(
                "depth_min {} must be below depth_max {}",
                self.depth_min, self.depth_max
            )));
        }
        if self.cooldown_ms == 0 {
            return Err(ConductorError::InvalidConfig(
                "cooldown_ms must be positive".into(),
            ));
        }
        if self.swipe_min_samples < 2 {
            return Err(ConductorError::InvalidConfig(
                "swipe_min_samples must be at least 2".into(),
            ));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_smoothing_outside_unit_interval() {
        let mut config = PipelineConfig::default();
        config.velocity_smoothing = 1.0;
        assert!(config.validate().is_err());
        config.velocity_smoothing = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_depth_bounds() {
        let mut config = PipelineConfig::default();
        config.depth_min = 5.0;
        config.depth_max = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cooldown_ms, config.cooldown_ms);
        assert_eq!(back.swipe_min_samples, config.swipe_min_samples);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"cooldown_ms": 250}"#).unwrap();
        assert_eq!(config.cooldown_ms, 250);
        assert_eq!(config.swipe_min_samples, PipelineConfig::default().swipe_min_samples);
    }
}
