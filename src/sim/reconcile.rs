//! Reconciliation of local prediction against authoritative state

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::collision::CollisionQuery;
use super::history::DEFAULT_HISTORY_CAPACITY;
use super::predictor::ClientPredictor;
use super::state::AuthoritativeUpdate;

/// Offsets smaller than this are dropped
const MIN_VISUAL_OFFSET: f32 = 0.01;

/// Correction tunables for the predicting host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconcileTuning {
    /// Allowed position divergence before correcting (units)
    pub position_deadband: f32,
    /// Allowed per-axis rotation divergence before correcting (degrees)
    pub rotation_deadband: f32,
    /// Decay rate of the visual correction offset (1/s); 0 snaps visibly
    pub correction_rate: f32,
    /// Upper bound on how long a visual correction may last (seconds)
    pub max_correction_secs: f32,
    /// Maximum predicted moves kept while waiting for acknowledgement
    pub history_capacity: usize,
    /// Sweep for collisions while replaying history
    pub replay_sweeps: bool,
}

impl Default for ReconcileTuning {
    fn default() -> Self {
        Self {
            position_deadband: 10.0,
            rotation_deadband: 5.0,
            correction_rate: 5.0,
            max_correction_secs: 0.5,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            replay_sweeps: true,
        }
    }
}

/// What happened to an authoritative update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    /// Older than an update already applied; discarded
    Stale,
    /// No prediction to compare against
    Idle,
    /// Prediction close enough, nothing changed
    WithinDeadband {
        position_error: f32,
        rotation_error: f32,
    },
    /// Local state moved onto authority and history replayed
    Corrected {
        position_error: f32,
        rotation_error: f32,
        replayed: usize,
    },
}

/// Largest per-axis gap between two positions
pub fn max_axis_distance(a: Vec3, b: Vec3) -> f32 {
    (a - b).abs().max_element()
}

/// Visual-only offset that hides a correction jump and decays to zero
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmoothCorrection {
    offset: Vec3,
    remaining: f32,
}

impl SmoothCorrection {
    /// Begin hiding a jump of `offset` over at most `duration` seconds
    pub fn start(offset: Vec3, duration: f32) -> Self {
        if duration <= 0.0 || !offset.is_finite() {
            return Self::default();
        }
        Self {
            offset,
            remaining: duration,
        }
    }

    /// Decay the offset by one frame and return it
    pub fn update(&mut self, dt: f32, rate: f32) -> Vec3 {
        if self.is_complete() {
            return Vec3::ZERO;
        }

        self.remaining -= dt.max(0.0);
        self.offset *= (-rate.max(0.0) * dt.max(0.0)).exp();

        if self.remaining <= 0.0 || self.offset.length() < MIN_VISUAL_OFFSET {
            *self = Self::default();
        }
        self.offset
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn is_complete(&self) -> bool {
        self.remaining <= 0.0
    }
}

/// Aligns a `ClientPredictor` with the authority whenever a new
/// authoritative state arrives
#[derive(Debug, Clone)]
pub struct Reconciler {
    tuning: ReconcileTuning,
    last_authority_timestamp: Option<f64>,
    correction: SmoothCorrection,
    corrections: u64,
    stale: u64,
}

impl Reconciler {
    pub fn new(tuning: ReconcileTuning) -> Self {
        Self {
            tuning,
            last_authority_timestamp: None,
            correction: SmoothCorrection::default(),
            corrections: 0,
            stale: 0,
        }
    }

    /// Handle one authoritative update
    pub fn on_authoritative_state(
        &mut self,
        update: &AuthoritativeUpdate,
        predictor: &mut ClientPredictor,
        world: Option<&dyn CollisionQuery>,
    ) -> ReconcileOutcome {
        let authority = update.state;

        if let Some(last) = self.last_authority_timestamp {
            if authority.timestamp < last {
                self.stale += 1;
                warn!(
                    timestamp = authority.timestamp,
                    last_applied = last,
                    "Discarding out-of-order authoritative state"
                );
                return ReconcileOutcome::Stale;
            }
        }
        self.last_authority_timestamp = Some(authority.timestamp);

        let ack = update.ack_timestamp.unwrap_or(f64::NEG_INFINITY);
        let Some(predicted) = predictor.history_mut().take_acknowledged(ack) else {
            return ReconcileOutcome::Idle;
        };

        let position_error = max_axis_distance(predicted.result.position, authority.position);
        let rotation_error = predicted
            .result
            .orientation
            .max_axis_difference(&authority.orientation);

        if !self.exceeds_deadband(position_error, rotation_error) {
            return ReconcileOutcome::WithinDeadband {
                position_error,
                rotation_error,
            };
        }

        let shown_before = predictor.state().position + self.correction.offset();

        predictor.rebase(&authority);
        let replay_world = if self.tuning.replay_sweeps { world } else { None };
        let replayed = predictor.replay(replay_world);

        let jump = shown_before - predictor.state().position;
        self.correction = if self.tuning.correction_rate > 0.0 {
            SmoothCorrection::start(jump, self.tuning.max_correction_secs)
        } else {
            SmoothCorrection::default()
        };

        self.corrections += 1;
        debug!(
            position_error,
            rotation_error,
            replayed,
            corrections = self.corrections,
            "Corrected prediction toward authority"
        );

        ReconcileOutcome::Corrected {
            position_error,
            rotation_error,
            replayed,
        }
    }

    /// Whether a divergence is large enough to correct
    pub fn exceeds_deadband(&self, position_error: f32, rotation_error: f32) -> bool {
        position_error > self.tuning.position_deadband
            || rotation_error > self.tuning.rotation_deadband
    }

    /// Advance the visual correction; add the result to the rendered position
    pub fn visual_offset(&mut self, dt: f32) -> Vec3 {
        self.correction.update(dt, self.tuning.correction_rate)
    }

    pub fn pending_offset(&self) -> Vec3 {
        self.correction.offset()
    }

    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    pub fn stale(&self) -> u64 {
        self.stale
    }

    pub fn tuning(&self) -> &ReconcileTuning {
        &self.tuning
    }
}
