// src/control.rs - discrete scene state and the debounced gesture router
use std::collections::HashMap;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::tracking::{Gesture, HandObservation};

pub const COUNT_STEP: u32 = 10_000;
pub const COUNT_MIN: u32 = 10_000;
pub const COUNT_MAX: u32 = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleShape {
    Galaxy,
    Cube,
    Wave,
}

/// Fixed palette table the sink interpolates over. Keyed by id; entries are
/// RGB triples in [0, 1].
pub static PALETTES: Lazy<HashMap<&'static str, Vec<[f32; 3]>>> = Lazy::new(|| {
    let mut palettes = HashMap::new();
    palettes.insert(
        "nebula",
        vec![
            [0.18, 0.10, 0.45],
            [0.55, 0.20, 0.75],
            [0.95, 0.60, 0.90],
            [0.40, 0.80, 1.00],
        ],
    );
    palettes.insert(
        "ember",
        vec![
            [0.25, 0.02, 0.00],
            [0.85, 0.25, 0.05],
            [1.00, 0.65, 0.15],
            [1.00, 0.95, 0.60],
        ],
    );
    palettes.insert(
        "aurora",
        vec![
            [0.00, 0.15, 0.20],
            [0.05, 0.60, 0.45],
            [0.35, 0.95, 0.60],
            [0.80, 1.00, 0.90],
        ],
    );
    palettes.insert(
        "mono",
        vec![[0.05, 0.05, 0.08], [0.55, 0.58, 0.65], [0.95, 0.96, 1.00]],
    );
    palettes
});

pub fn palette_colors(id: &str) -> Option<&'static [[f32; 3]]> {
    PALETTES.get(id).map(|colors| colors.as_slice())
}

/// Long-lived scene state. Step gestures mutate it through the router; the
/// UI overlay writes its fields directly, at any time.
#[derive(Debug, Clone)]
pub struct ControlState {
    pub particle_count: u32,
    pub shape: ParticleShape,
    pub palette: String,
    pub particle_size: f64,
    pub glow_intensity: f64,
    pub mirrored: bool,
    pub show_skeleton: bool,
    pub control_active: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            particle_count: 80_000,
            shape: ParticleShape::Galaxy,
            palette: "nebula".to_string(),
            particle_size: 1.0,
            glow_intensity: 0.6,
            mirrored: false,
            show_skeleton: false,
            control_active: true,
        }
    }
}

/// Rate limiter for step gestures: one accepted mutation per window.
#[derive(Debug, Default)]
pub struct GestureCooldown {
    next_eligible: Option<Instant>,
}

impl GestureCooldown {
    pub fn ready(&self, now: Instant) -> bool {
        self.next_eligible.map_or(true, |deadline| now >= deadline)
    }

    pub fn arm(&mut self, now: Instant, window: Duration) {
        self.next_eligible = Some(now + window);
    }
}

/// Routes classified hands into `ControlState`. Display feedback (the last
/// gesture label and the published hand array) is never rate limited; only
/// the particle-count mutation goes through the cooldown.
pub struct GestureRouter {
    cooldown: GestureCooldown,
    cooldown_window: Duration,
    last_gesture: Gesture,
    displayed: Vec<HandObservation>,
    was_active: bool,
}

impl GestureRouter {
    pub fn new(cooldown_window: Duration) -> Self {
        Self {
            cooldown: GestureCooldown::default(),
            cooldown_window,
            last_gesture: Gesture::None,
            displayed: Vec::new(),
            was_active: false,
        }
    }

    /// Latest resolved gesture label, for the UI overlay.
    pub fn gesture(&self) -> Gesture {
        self.last_gesture
    }

    /// Hand array published for UI feedback.
    pub fn displayed_hands(&self) -> &[HandObservation] {
        &self.displayed
    }

    pub fn route(&mut self, hands: &[HandObservation], state: &mut ControlState, now: Instant) {
        if !state.control_active {
            // One-time reset on the active -> inactive edge so no stale
            // gesture lingers in the UI; then a no-op until reactivated.
            if self.was_active {
                self.was_active = false;
                self.last_gesture = Gesture::None;
                self.displayed.clear();
            }
            return;
        }
        self.was_active = true;

        if hands.is_empty() {
            if self.last_gesture != Gesture::None {
                self.last_gesture = Gesture::None;
                self.displayed.clear();
            }
            return;
        }

        let gesture = hands[0].gesture;
        if gesture != self.last_gesture {
            debug!(from = self.last_gesture.label(), to = gesture.label(), "gesture changed");
            self.last_gesture = gesture;
            self.displayed = hands.to_vec();
        }

        if gesture.is_step() && self.cooldown.ready(now) {
            let before = state.particle_count;
            state.particle_count = match gesture {
                Gesture::SwipeUp => (before + COUNT_STEP).min(COUNT_MAX),
                Gesture::SwipeDown => before.saturating_sub(COUNT_STEP).max(COUNT_MIN),
                _ => before,
            };
            // A swipe at the bound is still an accepted gesture; only its
            // effect saturates.
            self.cooldown.arm(now, self.cooldown_window);
            if state.particle_count != before {
                info!(
                    gesture = gesture.label(),
                    particle_count = state.particle_count,
                    "step gesture accepted"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn hand(gesture: Gesture) -> HandObservation {
        HandObservation {
            center: Vector3::new(0.5, 0.5, 0.0),
            velocity: Vector3::zeros(),
            rotation: 0.0,
            finger_count: 2,
            is_fist: false,
            is_open: false,
            is_pinching: false,
            gesture,
        }
    }

    fn new_router() -> GestureRouter {
        GestureRouter::new(Duration::from_millis(400))
    }

    fn at(start: Instant, ms: u64) -> Instant {
        start + Duration::from_millis(ms)
    }

    #[test]
    fn count_invariant_holds_after_mutations() {
        let mut router = new_router();
        let mut state = ControlState::default();
        let start = Instant::now();
        for i in 0..40 {
            let gesture = if i % 3 == 0 { Gesture::SwipeDown } else { Gesture::SwipeUp };
            router.route(&[hand(gesture)], &mut state, at(start, i * 450));
            assert_eq!(state.particle_count % COUNT_STEP, 0);
            assert!((COUNT_MIN..=COUNT_MAX).contains(&state.particle_count));
        }
    }

    #[test]
    fn identical_frames_within_window_mutate_once() {
        let mut router = new_router();
        let mut state = ControlState::default();
        let start = Instant::now();
        let hands = [hand(Gesture::SwipeUp)];
        router.route(&hands, &mut state, start);
        router.route(&hands, &mut state, at(start, 50));
        assert_eq!(state.particle_count, 90_000);
    }

    #[test]
    fn cooldown_gates_at_400ms() {
        let mut state = ControlState::default();
        let start = Instant::now();

        // 100 ms apart: one mutation.
        let mut router = new_router();
        router.route(&[hand(Gesture::SwipeUp)], &mut state, start);
        router.route(&[hand(Gesture::SwipeUp)], &mut state, at(start, 100));
        assert_eq!(state.particle_count, 90_000);

        // 500 ms apart: two mutations.
        let mut router = new_router();
        let mut state = ControlState::default();
        router.route(&[hand(Gesture::SwipeUp)], &mut state, start);
        router.route(&[hand(Gesture::SwipeUp)], &mut state, at(start, 500));
        assert_eq!(state.particle_count, 100_000);
    }

    #[test]
    fn scenario_from_80k() {
        let mut router = new_router();
        let mut state = ControlState::default();
        assert_eq!(state.particle_count, 80_000);
        let start = Instant::now();

        router.route(&[hand(Gesture::SwipeUp)], &mut state, start);
        assert_eq!(state.particle_count, 90_000);

        router.route(&[hand(Gesture::SwipeUp)], &mut state, at(start, 200));
        assert_eq!(state.particle_count, 90_000);

        router.route(&[hand(Gesture::SwipeUp)], &mut state, at(start, 401));
        assert_eq!(state.particle_count, 100_000);
    }

    #[test]
    fn count_clamps_at_both_bounds() {
        let mut router = new_router();
        let mut state = ControlState::default();
        state.particle_count = COUNT_MIN;
        let start = Instant::now();
        for i in 0..5 {
            router.route(&[hand(Gesture::SwipeDown)], &mut state, at(start, i * 450));
        }
        assert_eq!(state.particle_count, COUNT_MIN);

        state.particle_count = COUNT_MAX;
        for i in 5..10 {
            router.route(&[hand(Gesture::SwipeUp)], &mut state, at(start, i * 450));
        }
        assert_eq!(state.particle_count, COUNT_MAX);
    }

    #[test]
    fn inactive_control_drops_everything() {
        let mut router = new_router();
        let mut state = ControlState::default();
        state.control_active = false;
        let before = state.clone();
        let start = Instant::now();
        for i in 0..5 {
            router.route(&[hand(Gesture::SwipeUp)], &mut state, at(start, i * 450));
        }
        assert_eq!(state.particle_count, before.particle_count);
        assert_eq!(router.gesture(), Gesture::None);
        assert!(router.displayed_hands().is_empty());
    }

    #[test]
    fn deactivation_resets_display_once() {
        let mut router = new_router();
        let mut state = ControlState::default();
        let start = Instant::now();

        router.route(&[hand(Gesture::Fist)], &mut state, start);
        assert_eq!(router.gesture(), Gesture::Fist);
        assert_eq!(router.displayed_hands().len(), 1);

        state.control_active = false;
        router.route(&[hand(Gesture::Fist)], &mut state, at(start, 33));
        assert_eq!(router.gesture(), Gesture::None);
        assert!(router.displayed_hands().is_empty());
    }

    #[test]
    fn empty_array_clears_label_exactly_once() {
        let mut router = new_router();
        let mut state = ControlState::default();
        let start = Instant::now();

        router.route(&[hand(Gesture::Open)], &mut state, start);
        assert_eq!(router.gesture(), Gesture::Open);

        router.route(&[], &mut state, at(start, 33));
        assert_eq!(router.gesture(), Gesture::None);
        assert!(router.displayed_hands().is_empty());

        // Further empty frames stay quiescent.
        router.route(&[], &mut state, at(start, 66));
        assert_eq!(router.gesture(), Gesture::None);
    }

    #[test]
    fn display_feedback_is_not_rate_limited() {
        let mut router = new_router();
        let mut state = ControlState::default();
        let start = Instant::now();

        router.route(&[hand(Gesture::SwipeUp)], &mut state, start);
        // 50 ms later, inside the cooldown: a new label still publishes.
        router.route(&[hand(Gesture::Fist)], &mut state, at(start, 50));
        assert_eq!(router.gesture(), Gesture::Fist);
        assert_eq!(state.particle_count, 90_000);
    }

    #[test]
    fn known_palettes_resolve() {
        for id in ["nebula", "ember", "aurora", "mono"] {
            assert!(palette_colors(id).is_some(), "missing palette {id}");
        }
        assert!(palette_colors("vaporwave").is_none());
    }
}
