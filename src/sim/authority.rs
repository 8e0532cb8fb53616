//! Authoritative movement: the only producer of canonical state

use tracing::{debug, trace};

use super::collision::CollisionQuery;
use super::mover::{integrate, valid_dt, Kinematics, MoverTuning};
use super::state::{DesiredInput, InputSample, MotionState};

/// Owns the canonical `MotionState` of one vehicle
#[derive(Debug, Clone)]
pub struct AuthoritySimulator {
    body: Kinematics,
    tuning: MoverTuning,
    /// Last-known input; stays active until a newer one arrives
    input: DesiredInput,
    ack_timestamp: Option<f64>,
    rejected: u64,
}

impl AuthoritySimulator {
    pub fn new(spawn: MotionState, tuning: MoverTuning) -> Self {
        Self {
            body: Kinematics::new(spawn),
            tuning,
            input: DesiredInput::ZERO,
            ack_timestamp: None,
            rejected: 0,
        }
    }

    /// Accept a relayed input sample. Returns false when it was refused.
    pub fn submit_input(&mut self, sample: &InputSample) -> bool {
        match sample.sanitize(self.ack_timestamp) {
            Ok(input) => {
                self.input = input;
                self.ack_timestamp = Some(sample.timestamp);
                true
            }
            Err(reason) => {
                self.rejected += 1;
                debug!(%reason, rejected = self.rejected, "Input sample rejected");
                false
            }
        }
    }

    /// Input from a controller on this host
    pub fn set_local_input(&mut self, input: DesiredInput) {
        self.input = input.clamped();
    }

    /// Advance one tick and publish the result.
    ///
    /// Returns `None` without touching state when there is no world or
    /// the tick length is unusable.
    pub fn tick(
        &mut self,
        dt: f32,
        now: f64,
        world: Option<&dyn CollisionQuery>,
    ) -> Option<MotionState> {
        let Some(world) = world else {
            trace!("No active world, skipping authority tick");
            return None;
        };
        if !valid_dt(dt) || !now.is_finite() {
            trace!(dt, now, "Unusable tick, skipping authority tick");
            return None;
        }

        let input = self.input;
        integrate(&mut self.body, &input, dt, &self.tuning, Some(world));

        self.body.motion.timestamp = now.max(self.body.motion.timestamp);
        Some(self.body.motion)
    }

    /// Current authoritative state
    pub fn state(&self) -> &MotionState {
        &self.body.motion
    }

    pub fn yaw_rate(&self) -> f32 {
        self.body.yaw_rate
    }

    pub fn input(&self) -> &DesiredInput {
        &self.input
    }

    /// Timestamp of the newest accepted input sample
    pub fn ack_timestamp(&self) -> Option<f64> {
        self.ack_timestamp
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn tuning(&self) -> &MoverTuning {
        &self.tuning
    }
}
