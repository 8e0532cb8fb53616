//! Cosmetic body tilt derived from velocity

use glam::Vec3;

use super::mover::MoverTuning;
use super::rotator::{interp_angle, Rotator};

/// Leans the body into its motion. Never replicated; every host runs it
/// on the velocity it already knows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltSmoother {
    max_tilt_angle: f32,
    smoothing_rate: f32,
    max_forward_speed: f32,
    max_lateral_speed: f32,
}

impl TiltSmoother {
    pub fn new(tuning: &MoverTuning) -> Self {
        Self {
            max_tilt_angle: tuning.max_tilt_angle.abs(),
            smoothing_rate: tuning.tilt_smoothing_rate,
            max_forward_speed: tuning.max_forward_speed,
            max_lateral_speed: tuning.max_lateral_speed,
        }
    }

    /// Target (pitch, roll): nose down when moving forward, bank into
    /// sideways motion.
    pub fn target(&self, velocity: Vec3, heading: &Rotator) -> (f32, f32) {
        let limit = self.max_tilt_angle;

        let pitch = if self.max_forward_speed > 0.0 {
            velocity.dot(heading.forward()) / self.max_forward_speed * -limit
        } else {
            0.0
        };
        let roll = if self.max_lateral_speed > 0.0 {
            velocity.dot(heading.right()) / self.max_lateral_speed * limit
        } else {
            0.0
        };

        (pitch.clamp(-limit, limit), roll.clamp(-limit, limit))
    }

    /// Ease the body's pitch and roll toward the target; yaw passes through
    pub fn apply(&self, current: Rotator, velocity: Vec3, heading: &Rotator, dt: f32) -> Rotator {
        let (pitch, roll) = self.target(velocity, heading);

        Rotator {
            pitch: interp_angle(current.pitch, pitch, dt, self.smoothing_rate),
            yaw: current.yaw,
            roll: interp_angle(current.roll, roll, dt, self.smoothing_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_forward_speed_pitches_nose_down() {
        let tuning = MoverTuning::default();
        let tilt = TiltSmoother::new(&tuning);

        let (pitch, roll) = tilt.target(Vec3::new(1500.0, 0.0, 0.0), &Rotator::ZERO);
        assert!((pitch + 15.0).abs() < 1.0e-4);
        assert!(roll.abs() < 1.0e-4);
    }

    #[test]
    fn test_target_is_clamped() {
        let tuning = MoverTuning::default();
        let tilt = TiltSmoother::new(&tuning);

        let (_, roll) = tilt.target(Vec3::new(0.0, 5000.0, 0.0), &Rotator::ZERO);
        assert_eq!(roll, 15.0);
    }

    #[test]
    fn test_target_follows_heading() {
        let tuning = MoverTuning::default();
        let tilt = TiltSmoother::new(&tuning);

        // Facing +Y, moving +Y is forward flight
        let (pitch, roll) = tilt.target(Vec3::new(0.0, 750.0, 0.0), &Rotator::from_yaw(90.0));
        assert!((pitch + 7.5).abs() < 1.0e-3);
        assert!(roll.abs() < 1.0e-3);
    }

    #[test]
    fn test_apply_eases_and_keeps_yaw() {
        let tuning = MoverTuning::default();
        let tilt = TiltSmoother::new(&tuning);
        let current = Rotator::new(0.0, 42.0, 0.0);

        let next = tilt.apply(current, Vec3::new(1500.0, 0.0, 0.0), &Rotator::ZERO, 0.1);

        assert_eq!(next.yaw, 42.0);
        assert!(next.pitch < 0.0 && next.pitch > -15.0);
    }

    #[test]
    fn test_zero_speed_limits_do_not_divide() {
        let tuning = MoverTuning {
            max_forward_speed: 0.0,
            max_lateral_speed: 0.0,
            ..MoverTuning::default()
        };
        let tilt = TiltSmoother::new(&tuning);

        assert_eq!(tilt.target(Vec3::new(100.0, 100.0, 0.0), &Rotator::ZERO), (0.0, 0.0));
    }
}
