// src/pipeline.rs - context object wiring the pipeline stages together
//
// One instance owns every long-lived piece of pipeline state. Detector frames
// come in through `ingest_frame` at the detector's cadence; the renderer pulls
// `render_params` once per tick at its own cadence. The classified-hands
// snapshot is fully replaced on each ingest, so the router and smoother always
// read a coherent array and never wait for a fresh one.
use std::time::{Duration, Instant};

use nalgebra::Vector3;

use crate::config::{ConductorError, PipelineConfig};
use crate::control::{palette_colors, ControlState, GestureRouter, ParticleShape};
use crate::scene::{SceneController, SmoothedCameraState};
use crate::source::LandmarkFrame;
use crate::tracking::{HandObservation, HandTracker};

/// Per-hand influence handed to the renderer, keyed by hand-domain index.
#[derive(Debug, Clone)]
pub struct HandForce {
    pub index: usize,
    pub center: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub force: Vector3<f64>,
    /// 1.0 for a closed fist, 0.0 for a fully open palm.
    pub fist_factor: f64,
}

/// Everything the render engine consumes for one tick.
#[derive(Debug, Clone)]
pub struct RenderParams {
    pub shape: ParticleShape,
    pub particle_count: u32,
    pub palette: &'static [[f32; 3]],
    pub particle_size: f64,
    pub glow_intensity: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub depth: f64,
    pub hands: Vec<HandForce>,
    pub mirrored: bool,
    pub show_skeleton: bool,
}

pub struct Pipeline {
    config: PipelineConfig,
    tracker: HandTracker,
    router: GestureRouter,
    scene: SceneController,
    control: ControlState,
    hands: Vec<HandObservation>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConductorError> {
        config.validate()?;
        Ok(Self {
            tracker: HandTracker::new(config.clone()),
            router: GestureRouter::new(config.cooldown()),
            scene: SceneController::new(config.clone()),
            control: ControlState::default(),
            hands: Vec::new(),
            config,
        })
    }

    /// Detector cadence: normalize and classify the frame, replace the hand
    /// snapshot, and route discrete gestures into the control state.
    pub fn ingest_frame(&mut self, frame: &LandmarkFrame, now: Instant) {
        self.control.mirrored = frame.mirrored;
        self.control.show_skeleton = frame.show_skeleton;
        self.hands = self.tracker.process_frame(frame, now);
        self.router.route(&self.hands, &mut self.control, now);
    }

    /// Render cadence: advance the continuous smoother against whatever hand
    /// snapshot is current.
    pub fn tick(&mut self, dt: Duration) {
        self.scene
            .tick(&self.hands, self.control.control_active, dt);
    }

    pub fn render_params(&self) -> RenderParams {
        let camera = self.scene.camera();
        let hands = self
            .hands
            .iter()
            .enumerate()
            .map(|(index, hand)| HandForce {
                index,
                center: hand.center,
                velocity: hand.velocity,
                force: hand.velocity * self.config.force_gain,
                fist_factor: f64::from(5 - hand.finger_count.min(5)) / 5.0,
            })
            .collect();

        RenderParams {
            shape: self.control.shape,
            particle_count: self.control.particle_count,
            palette: palette_colors(&self.control.palette).unwrap_or(&[]),
            particle_size: self.control.particle_size,
            glow_intensity: self.control.glow_intensity,
            yaw: camera.yaw,
            pitch: camera.pitch,
            depth: camera.depth,
            hands,
            mirrored: self.control.mirrored,
            show_skeleton: self.control.show_skeleton,
        }
    }

    pub fn control(&self) -> &ControlState {
        &self.control
    }

    pub fn camera(&self) -> &SmoothedCameraState {
        self.scene.camera()
    }

    /// Latest resolved gesture label, for the HUD.
    pub fn gesture_label(&self) -> &'static str {
        self.router.gesture().label()
    }

    /// Hands currently published for UI feedback.
    pub fn displayed_hands(&self) -> &[HandObservation] {
        self.router.displayed_hands()
    }

    // UI overlay writes. These bypass the gesture pipeline and are permitted
    // whether or not control is active.

    pub fn set_shape(&mut self, shape: ParticleShape) {
        self.control.shape = shape;
    }

    pub fn set_palette(&mut self, id: &str) -> Result<(), ConductorError> {
        if palette_colors(id).is_none() {
            return Err(ConductorError::UnknownPalette(id.to_string()));
        }
        self.control.palette = id.to_string();
        Ok(())
    }

    pub fn set_particle_size(&mut self, size: f64) {
        self.control.particle_size = size.max(0.01);
    }

    pub fn set_glow_intensity(&mut self, glow: f64) {
        self.control.glow_intensity = glow.max(0.0);
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.control.mirrored = mirrored;
    }

    pub fn set_show_skeleton(&mut self, show: bool) {
        self.control.show_skeleton = show;
    }

    pub fn set_control_active(&mut self, active: bool) {
        self.control.control_active = active;
    }
}
