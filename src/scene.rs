// src/scene.rs - continuous camera smoothing from the latest hand snapshot
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::tracking::HandObservation;

/// Camera placement, targets plus smoothed currents. Currents chase targets;
/// they never jump.
#[derive(Debug, Clone)]
pub struct SmoothedCameraState {
    pub yaw_target: f64,
    pub yaw: f64,
    pub pitch_target: f64,
    pub pitch: f64,
    pub depth_target: f64,
    pub depth: f64,
}

/// Per-tick controller for orientation and depth. Reads whatever hand
/// snapshot is current; never waits for a fresh one.
pub struct SceneController {
    camera: SmoothedCameraState,
    config: PipelineConfig,
}

impl SceneController {
    pub fn new(config: PipelineConfig) -> Self {
        let depth = config
            .initial_depth
            .clamp(config.depth_min, config.depth_max);
        Self {
            camera: SmoothedCameraState {
                yaw_target: 0.0,
                yaw: 0.0,
                pitch_target: 0.0,
                pitch: 0.0,
                depth_target: depth,
                depth,
            },
            config,
        }
    }

    pub fn camera(&self) -> &SmoothedCameraState {
        &self.camera
    }

    /// Advance one render tick. With control inactive or no hands present the
    /// whole camera state freezes in place, targets included.
    pub fn tick(&mut self, hands: &[HandObservation], control_active: bool, dt: Duration) {
        if !control_active || hands.is_empty() {
            return;
        }
        let dt = dt.as_secs_f64();

        let inv = 1.0 / hands.len() as f64;
        let avg_x: f64 = hands.iter().map(|h| h.center.x).sum::<f64>() * inv;
        let avg_y: f64 = hands.iter().map(|h| h.center.y).sum::<f64>() * inv;

        self.camera.yaw_target = (avg_x - 0.5) * self.config.yaw_sensitivity;
        self.camera.pitch_target = (avg_y - 0.5) * self.config.pitch_sensitivity;

        // Either hand can drive the zoom; open palm wins a simultaneous tie
        // with a fist so the tie-break is deterministic.
        let has_open = hands.iter().any(|h| h.is_open);
        let has_fist = hands.iter().any(|h| h.is_fist);
        if has_open {
            self.camera.depth_target =
                (self.camera.depth_target - self.config.zoom_speed * dt).max(self.config.depth_min);
        } else if has_fist {
            self.camera.depth_target =
                (self.camera.depth_target + self.config.zoom_speed * dt).min(self.config.depth_max);
        }

        let orientation_step = smoothing_factor(dt, self.config.orientation_half_life);
        let depth_step = smoothing_factor(dt, self.config.depth_half_life);
        self.camera.yaw += (self.camera.yaw_target - self.camera.yaw) * orientation_step;
        self.camera.pitch += (self.camera.pitch_target - self.camera.pitch) * orientation_step;
        self.camera.depth += (self.camera.depth_target - self.camera.depth) * depth_step;
    }
}

/// Fraction of the remaining distance to cover this tick, derived from a
/// half-life so the perceived smoothing is frame-rate independent. Always in
/// [0, 1], so a current value can reach its target but never overshoot.
fn smoothing_factor(dt: f64, half_life: f64) -> f64 {
    if half_life <= 0.0 {
        return 1.0;
    }
    1.0 - 0.5_f64.powf(dt / half_life)
}
