//! Pitch/yaw/roll orientation in degrees
//!
//! Axis convention: X forward, Y right, Z up. Yaw turns about Z,
//! pitch raises the nose toward +Z, roll banks the right side down.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Euler orientation, all angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub const ZERO: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Level heading with only a yaw component
    pub fn from_yaw(yaw: f32) -> Self {
        Self {
            pitch: 0.0,
            yaw,
            roll: 0.0,
        }
    }

    /// Unit vector the nose points along
    pub fn forward(&self) -> Vec3 {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        Vec3::new(cp * cy, cp * sy, sp)
    }

    /// Unit vector out of the right side of the body
    pub fn right(&self) -> Vec3 {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        let (sr, cr) = self.roll.to_radians().sin_cos();
        Vec3::new(sr * sp * cy - cr * sy, sr * sp * sy + cr * cy, -sr * cp)
    }

    pub fn is_finite(&self) -> bool {
        self.pitch.is_finite() && self.yaw.is_finite() && self.roll.is_finite()
    }

    /// Largest wrapped difference over the three axes, in [0, 180]
    pub fn max_axis_difference(&self, other: &Rotator) -> f32 {
        let dp = normalize_axis(self.pitch - other.pitch).abs();
        let dy = normalize_axis(self.yaw - other.yaw).abs();
        let dr = normalize_axis(self.roll - other.roll).abs();
        dp.max(dy).max(dr)
    }
}

/// Wrap an angle in degrees into (-180, 180]
pub fn normalize_axis(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Move an angle toward a target along the shortest arc.
///
/// The step is `clamp(dt * rate, 0, 1)` of the remaining arc; a
/// non-positive rate jumps straight to the target.
pub fn interp_angle(current: f32, target: f32, dt: f32, rate: f32) -> f32 {
    if rate <= 0.0 {
        return target;
    }

    let delta = normalize_axis(target - current);
    if delta.abs() < 1.0e-4 {
        return target;
    }

    normalize_axis(current + delta * (dt * rate).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1.0e-5
    }

    #[test]
    fn test_basis_vectors_at_zero() {
        let r = Rotator::ZERO;
        assert!(approx(r.forward(), Vec3::X));
        assert!(approx(r.right(), Vec3::Y));
    }

    #[test]
    fn test_basis_vectors_after_quarter_turn() {
        let r = Rotator::from_yaw(90.0);
        assert!(approx(r.forward(), Vec3::Y));
        assert!(approx(r.right(), -Vec3::X));
    }

    #[test]
    fn test_normalize_axis_wraps() {
        assert_eq!(normalize_axis(190.0), -170.0);
        assert_eq!(normalize_axis(-180.0), 180.0);
        assert_eq!(normalize_axis(720.0), 0.0);
    }

    #[test]
    fn test_axis_difference_uses_short_arc() {
        let a = Rotator::from_yaw(179.0);
        let b = Rotator::from_yaw(-179.0);
        assert!((a.max_axis_difference(&b) - 2.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_interp_angle_never_passes_target() {
        let mut angle = 0.0;
        for _ in 0..100 {
            angle = interp_angle(angle, 15.0, 0.1, 5.0);
            assert!(angle <= 15.0);
        }
        assert!((angle - 15.0).abs() < 1.0e-3);
    }
}
