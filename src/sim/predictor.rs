//! Client-side prediction for the controlling, non-authoritative host

use super::collision::CollisionQuery;
use super::history::{PredictedMove, PredictionHistory};
use super::mover::{integrate, valid_dt, Kinematics, MoverTuning};
use super::state::{DesiredInput, MotionState};

/// Runs the authority's integration locally so the controlling player
/// sees their input immediately, recording every move for reconciliation.
#[derive(Debug, Clone)]
pub struct ClientPredictor {
    body: Kinematics,
    tuning: MoverTuning,
    history: PredictionHistory,
}

impl ClientPredictor {
    pub fn new(spawn: MotionState, tuning: MoverTuning, history_capacity: usize) -> Self {
        Self {
            body: Kinematics::new(spawn),
            tuning,
            history: PredictionHistory::new(history_capacity),
        }
    }

    /// Record the current state and predict one tick ahead
    pub fn tick(
        &mut self,
        input: DesiredInput,
        dt: f32,
        now: f64,
        world: Option<&dyn CollisionQuery>,
    ) -> MotionState {
        if !valid_dt(dt) || !now.is_finite() {
            return self.body.motion;
        }

        let mut before = self.body.motion;
        before.timestamp = now;

        self.history.push(PredictedMove {
            state: before,
            yaw_rate: self.body.yaw_rate,
            input,
            dt,
            result: before,
        });

        integrate(&mut self.body, &input, dt, &self.tuning, world);
        self.body.motion.timestamp = now;

        if let Some(entry) = self.history.latest_mut() {
            entry.result = self.body.motion;
        }

        self.body.motion
    }

    /// Move the physics state onto an authoritative snapshot. The yaw rate
    /// is not replicated and is kept.
    pub fn rebase(&mut self, authoritative: &MotionState) {
        let timestamp = self.body.motion.timestamp;
        self.body.motion = *authoritative;
        self.body.motion.timestamp = timestamp;
    }

    /// Re-run every queued move from the current state, rewriting each
    /// entry with its new before/after states. Returns the number replayed.
    pub fn replay(&mut self, world: Option<&dyn CollisionQuery>) -> usize {
        let mut replayed = 0;

        for entry in self.history.iter_mut() {
            let stamp = entry.state.timestamp;

            entry.state = MotionState {
                timestamp: stamp,
                ..self.body.motion
            };
            entry.yaw_rate = self.body.yaw_rate;

            integrate(&mut self.body, &entry.input, entry.dt, &self.tuning, world);
            self.body.motion.timestamp = stamp;
            entry.result = self.body.motion;
            replayed += 1;
        }

        replayed
    }

    /// Latest locally predicted state
    pub fn state(&self) -> &MotionState {
        &self.body.motion
    }

    pub fn yaw_rate(&self) -> f32 {
        self.body.yaw_rate
    }

    pub fn history(&self) -> &PredictionHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut PredictionHistory {
        &mut self.history
    }

    pub fn tuning(&self) -> &MoverTuning {
        &self.tuning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::authority::AuthoritySimulator;
    use crate::sim::collision::OpenSky;
    use crate::sim::state::InputSample;
    use glam::Vec3;

    fn spawn() -> MotionState {
        MotionState::at_rest(Vec3::new(0.0, 0.0, 800.0), 0.0)
    }

    fn input() -> DesiredInput {
        DesiredInput {
            forward: 1.0,
            lateral: 0.3,
            vertical: 0.0,
            yaw: 0.5,
        }
    }

    #[test]
    fn test_history_records_state_before_move() {
        let mut predictor = ClientPredictor::new(spawn(), MoverTuning::default(), 16);

        let after = predictor.tick(input(), 0.1, 0.1, Some(&OpenSky));

        let entry = predictor.history().iter().next().copied().unwrap();
        assert_eq!(entry.state.position, spawn().position);
        assert_eq!(entry.state.timestamp, 0.1);
        assert_eq!(entry.result, after);
        assert_ne!(after.position, spawn().position);
    }

    #[test]
    fn test_prediction_mirrors_authority() {
        let tuning = MoverTuning::default();
        let mut predictor = ClientPredictor::new(spawn(), tuning, 64);
        let mut authority = AuthoritySimulator::new(spawn(), tuning);

        for i in 1..=30 {
            let now = i as f64 * 0.05;
            let local = predictor.tick(input(), 0.05, now, Some(&OpenSky));
            authority.submit_input(&InputSample::new(input(), now));
            let remote = authority.tick(0.05, now, Some(&OpenSky)).unwrap();

            assert!((local.position - remote.position).length() < 1.0e-2);
            assert!((local.orientation.yaw - remote.orientation.yaw).abs() < 1.0e-3);
        }
    }

    #[test]
    fn test_replay_from_same_state_is_identity() {
        let mut predictor = ClientPredictor::new(spawn(), MoverTuning::default(), 64);
        for i in 1..=5 {
            predictor.tick(input(), 0.1, i as f64 * 0.1, Some(&OpenSky));
        }
        let predicted = *predictor.state();

        let first = predictor.history().iter().next().copied().unwrap();
        predictor.body = Kinematics {
            motion: first.state,
            yaw_rate: first.yaw_rate,
        };
        let replayed = predictor.replay(Some(&OpenSky));

        assert_eq!(replayed, 5);
        assert!((predictor.state().position - predicted.position).length() < 1.0e-3);
    }

    #[test]
    fn test_invalid_tick_records_nothing() {
        let mut predictor = ClientPredictor::new(spawn(), MoverTuning::default(), 8);
        predictor.tick(input(), 0.0, 1.0, Some(&OpenSky));
        assert!(predictor.history().is_empty());
    }
}
