// src/tracking.rs - landmark normalization and gesture classification
use nalgebra::Vector3;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::source::{LandmarkFrame, LANDMARKS_PER_HAND};

// MediaPipe hand landmark indices
const WRIST: usize = 0;
const THUMB_TIP: usize = 4;
const INDEX_MCP: usize = 5;
const INDEX_TIP: usize = 8;
const PINKY_MCP: usize = 17;
const PALM_INDICES: [usize; 5] = [0, 5, 9, 13, 17];
// [PIP, TIP] per non-thumb finger
const FINGER_JOINTS: [[usize; 2]; 4] = [[6, 8], [10, 12], [14, 16], [18, 20]];

// A folded thumb tucks its tip against the index knuckle.
const THUMB_CLEAR_DISTANCE: f64 = 0.08;
// Assumed detector cadence until two frames establish a real dt.
const DEFAULT_FRAME_DT: f64 = 1.0 / 30.0;
// Vertical deltas below this are treated as detector noise, not direction.
const SWIPE_NOISE_FLOOR: f64 = 1e-4;

pub const MAX_HANDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    None,
    Fist,
    Open,
    Pinch,
    SwipeUp,
    SwipeDown,
}

impl Gesture {
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::None => "none",
            Gesture::Fist => "fist",
            Gesture::Open => "open",
            Gesture::Pinch => "pinch",
            Gesture::SwipeUp => "swipe up",
            Gesture::SwipeDown => "swipe down",
        }
    }

    /// Step gestures mutate bounded state through the cooldown; everything
    /// else is consumed continuously.
    pub fn is_step(&self) -> bool {
        matches!(self, Gesture::SwipeUp | Gesture::SwipeDown)
    }
}

/// One hand, one frame. Built fresh per detector frame, never mutated after.
#[derive(Debug, Clone)]
pub struct HandObservation {
    pub center: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub rotation: f64,
    pub finger_count: u8,
    pub is_fist: bool,
    pub is_open: bool,
    pub is_pinching: bool,
    pub gesture: Gesture,
}

/// Per-identity state carried between frames: smoothed velocity and the
/// rolling vertical-center buffer the swipe check reads.
struct HandSlot {
    center: Vector3<f64>,
    velocity: Vector3<f64>,
    vertical_history: VecDeque<(f64, f64)>,
    last_seen: f64,
}

impl HandSlot {
    fn new(center: Vector3<f64>, t: f64) -> Self {
        Self {
            center,
            velocity: Vector3::zeros(),
            vertical_history: VecDeque::new(),
            last_seen: t,
        }
    }
}

/// Converts raw landmark frames into classified observations. Hands keep a
/// stable identity across frames via nearest-previous-center matching, so a
/// detector that reorders its output costs one frame of velocity, not a spike.
pub struct HandTracker {
    slots: [Option<HandSlot>; MAX_HANDS],
    epoch: Instant,
    last_frame_at: Option<Instant>,
    config: PipelineConfig,
}

impl HandTracker {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            slots: [None, None],
            epoch: Instant::now(),
            last_frame_at: None,
            config,
        }
    }

    /// Normalize and classify every well-formed hand in the frame. Malformed
    /// hands are dropped for this frame only.
    pub fn process_frame(&mut self, frame: &LandmarkFrame, now: Instant) -> Vec<HandObservation> {
        let t = now.duration_since(self.epoch).as_secs_f64();
        let dt = self
            .last_frame_at
            .map(|prev| now.duration_since(prev).as_secs_f64())
            .filter(|d| *d > 0.0)
            .unwrap_or(DEFAULT_FRAME_DT);
        self.last_frame_at = Some(now);

        let mut observations = Vec::new();
        let mut claimed = [false; MAX_HANDS];

        for (hand_index, raw) in frame.hands.iter().take(MAX_HANDS).enumerate() {
            let points = match validate_landmarks(raw) {
                Some(points) => points,
                None => {
                    debug!(hand_index, point_count = raw.len(), "dropping malformed hand");
                    continue;
                }
            };

            let center = palm_center(&points);
            let slot_index = self.claim_slot(&center, t, &claimed);
            claimed[slot_index] = true;

            let slot = self.slots[slot_index].get_or_insert_with(|| HandSlot::new(center, t));

            let alpha = self.config.velocity_smoothing;
            let raw_velocity = (center - slot.center) / dt;
            slot.velocity = raw_velocity * alpha + slot.velocity * (1.0 - alpha);
            slot.center = center;
            slot.last_seen = t;

            slot.vertical_history.push_back((t, center.y));
            let horizon = t - self.config.swipe_window;
            while slot
                .vertical_history
                .front()
                .map_or(false, |&(sample_t, _)| sample_t < horizon)
            {
                slot.vertical_history.pop_front();
            }

            let velocity = slot.velocity;
            let finger_count = count_extended_fingers(&points);
            let (is_fist, is_open, is_pinching, candidate) =
                classify_predicates(&points, finger_count, self.config.pinch_threshold);
            let gesture = swipe_label(
                velocity.y,
                &slot.vertical_history,
                self.config.swipe_velocity_threshold,
                self.config.swipe_min_samples,
            )
            .unwrap_or(candidate);

            observations.push(HandObservation {
                center,
                velocity,
                rotation: palm_roll(&points),
                finger_count,
                is_fist,
                is_open,
                is_pinching,
                gesture,
            });
        }

        // Slots that saw no hand this frame are released once stale, so a
        // reappearing hand starts with a clean velocity instead of carrying
        // a spike across the gap.
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if claimed[i] {
                continue;
            }
            if slot
                .as_ref()
                .map_or(false, |s| t - s.last_seen > self.config.swipe_window)
            {
                *slot = None;
            }
        }

        observations
    }

    /// Nearest unclaimed slot within the match bound; otherwise a free slot;
    /// otherwise the stalest one, recycled.
    fn claim_slot(&mut self, center: &Vector3<f64>, t: f64, claimed: &[bool; MAX_HANDS]) -> usize {
        let mut best: Option<(usize, f64)> = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if claimed[i] {
                continue;
            }
            if let Some(slot) = slot {
                let distance = (slot.center - center).norm();
                if distance <= self.config.hand_match_distance
                    && best.map_or(true, |(_, best_distance)| distance < best_distance)
                {
                    best = Some((i, distance));
                }
            }
        }
        if let Some((i, _)) = best {
            return i;
        }

        if let Some(i) = (0..MAX_HANDS).find(|&i| !claimed[i] && self.slots[i].is_none()) {
            return i;
        }

        let stalest = (0..MAX_HANDS)
            .filter(|&i| !claimed[i])
            .min_by(|&a, &b| {
                let age = |i: usize| self.slots[i].as_ref().map_or(0.0, |s| s.last_seen);
                age(a).total_cmp(&age(b))
            })
            .unwrap_or(0);
        self.slots[stalest] = Some(HandSlot::new(*center, t));
        stalest
    }
}

/// A swipe needs sustained vertical speed with a consistent direction across
/// the rolling buffer; a single fast frame is not enough.
fn swipe_label(
    vy: f64,
    history: &VecDeque<(f64, f64)>,
    velocity_threshold: f64,
    min_samples: usize,
) -> Option<Gesture> {
    if vy.abs() < velocity_threshold {
        return None;
    }
    if history.len() < min_samples {
        return None;
    }
    let mut prev_y: Option<f64> = None;
    for &(_, y) in history {
        if let Some(prev) = prev_y {
            let delta = y - prev;
            if delta.abs() > SWIPE_NOISE_FLOOR && delta.signum() != vy.signum() {
                return None;
            }
        }
        prev_y = Some(y);
    }
    // Normalized image coordinates grow downward.
    Some(if vy < 0.0 {
        Gesture::SwipeUp
    } else {
        Gesture::SwipeDown
    })
}

fn validate_landmarks(raw: &[[f64; 3]]) -> Option<Vec<Vector3<f64>>> {
    if raw.len() != LANDMARKS_PER_HAND {
        return None;
    }
    let mut points = Vec::with_capacity(LANDMARKS_PER_HAND);
    for &[x, y, z] in raw {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return None;
        }
        // Detectors overshoot the frame edges a little; far outside is garbage.
        if !(-0.5..=1.5).contains(&x) || !(-0.5..=1.5).contains(&y) {
            return None;
        }
        points.push(Vector3::new(x, y, z));
    }
    Some(points)
}

fn palm_center(points: &[Vector3<f64>]) -> Vector3<f64> {
    PALM_INDICES
        .iter()
        .map(|&i| points[i])
        .sum::<Vector3<f64>>()
        / PALM_INDICES.len() as f64
}

/// Roll of the knuckle row, index MCP to pinky MCP.
fn palm_roll(points: &[Vector3<f64>]) -> f64 {
    let span = points[INDEX_MCP] - points[PINKY_MCP];
    span.y.atan2(span.x)
}

fn count_extended_fingers(points: &[Vector3<f64>]) -> u8 {
    let wrist = points[WRIST];
    let mut count = 0;
    for [pip, tip] in FINGER_JOINTS {
        if (points[tip] - wrist).norm() > (points[pip] - wrist).norm() {
            count += 1;
        }
    }
    if (points[THUMB_TIP] - points[INDEX_MCP]).norm() > THUMB_CLEAR_DISTANCE {
        count += 1;
    }
    count
}

/// Continuous predicates plus the pre-swipe gesture candidate. Priority
/// order, first match wins; at most one predicate is set.
fn classify_predicates(
    points: &[Vector3<f64>],
    finger_count: u8,
    pinch_threshold: f64,
) -> (bool, bool, bool, Gesture) {
    if finger_count == 0 {
        return (true, false, false, Gesture::Fist);
    }
    if finger_count >= 4 {
        return (false, true, false, Gesture::Open);
    }
    if (points[THUMB_TIP] - points[INDEX_TIP]).norm() < pinch_threshold {
        return (false, false, true, Gesture::Pinch);
    }
    (false, false, false, Gesture::None)
}
