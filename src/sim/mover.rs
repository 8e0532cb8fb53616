//! Rotorcraft kinematics shared by the authority and the predictor

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collision::{resolve_impact, CollisionChannel, CollisionQuery, ImpactKind};
use super::rotator::normalize_axis;
use super::state::{DesiredInput, MotionState};

/// Movement tunables. Every host must run with the same values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoverTuning {
    /// Maximum forward speed (units/s)
    pub max_forward_speed: f32,
    /// Maximum side-to-side speed (units/s)
    pub max_lateral_speed: f32,
    /// Maximum climb/descent speed (units/s)
    pub max_vertical_speed: f32,
    /// Yaw rate at full yaw input (degrees/s)
    pub yaw_speed: f32,
    /// Fraction of the gap to the target velocity left after one second
    pub velocity_damping: f32,
    /// Maximum cosmetic body tilt (degrees)
    pub max_tilt_angle: f32,
    /// Body tilt interpolation rate (1/s)
    pub tilt_smoothing_rate: f32,
    /// Speed kept after a bounce, < 1
    pub bounce_damping: f32,
    /// Speed kept while sliding along a surface, < 1
    pub surface_friction: f32,
    /// Impacts faster than this bounce, slower ones slide
    pub skid_velocity_threshold: f32,
    /// Clearance left between the body and a surface after an impact
    pub impact_offset: f32,
    /// Radius of the swept collision sphere
    pub collision_radius: f32,
}

impl Default for MoverTuning {
    fn default() -> Self {
        Self {
            max_forward_speed: 1500.0,
            max_lateral_speed: 1000.0,
            max_vertical_speed: 500.0,
            yaw_speed: 90.0,
            velocity_damping: 0.95,
            max_tilt_angle: 15.0,
            tilt_smoothing_rate: 5.0,
            bounce_damping: 0.7,
            surface_friction: 0.9,
            skid_velocity_threshold: 400.0,
            impact_offset: 5.0,
            collision_radius: 150.0,
        }
    }
}

/// Integrator state: the visible motion plus the smoothed yaw rate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub motion: MotionState,
    /// Current yaw rate (degrees/s)
    pub yaw_rate: f32,
}

impl Kinematics {
    pub fn new(motion: MotionState) -> Self {
        Self {
            motion,
            yaw_rate: 0.0,
        }
    }
}

/// Whether a tick length can be integrated at all
pub fn valid_dt(dt: f32) -> bool {
    dt.is_finite() && dt > 0.0
}

/// Blend factor for exponential smoothing over `dt` seconds.
///
/// `1 - damping^dt`, so one tick of `T` equals two ticks of `T/2`.
pub fn damping_alpha(damping: f32, dt: f32) -> f32 {
    if !valid_dt(dt) {
        return 0.0;
    }
    (1.0 - damping.clamp(0.0, 1.0).powf(dt)).clamp(0.0, 1.0)
}

/// Velocity the input asks for, in world space
pub fn target_velocity(input: &DesiredInput, motion: &MotionState, tuning: &MoverTuning) -> Vec3 {
    let forward = motion.orientation.forward();
    let right = motion.orientation.right();

    forward * (input.forward * tuning.max_forward_speed)
        + right * (input.lateral * tuning.max_lateral_speed)
        + Vec3::Z * (input.vertical * tuning.max_vertical_speed)
}

/// Advance one tick.
///
/// Smooths velocity toward the input target, moves with a swept sphere
/// when a world is given, then smooths and applies yaw. Pitch and roll
/// are left alone. Returns the collision branch taken, if any.
pub fn integrate(
    body: &mut Kinematics,
    input: &DesiredInput,
    dt: f32,
    tuning: &MoverTuning,
    world: Option<&dyn CollisionQuery>,
) -> Option<ImpactKind> {
    if !valid_dt(dt) {
        return None;
    }

    let alpha = damping_alpha(tuning.velocity_damping, dt);

    // Translation
    let target = target_velocity(input, &body.motion, tuning);
    body.motion.velocity = body.motion.velocity.lerp(target, alpha);

    let start = body.motion.position;
    let end = start + body.motion.velocity * dt;

    let hit = world.and_then(|w| {
        w.sweep(start, end, tuning.collision_radius, CollisionChannel::WorldStatic)
    });

    let impact = match hit {
        Some(outcome) => {
            let response = resolve_impact(body.motion.velocity, &outcome, tuning);
            body.motion.position = response.position;
            body.motion.velocity = response.velocity;
            Some(response.kind)
        }
        None => {
            body.motion.position = end;
            None
        }
    };

    // Yaw
    let target_yaw_rate = input.yaw * tuning.yaw_speed;
    body.yaw_rate += (target_yaw_rate - body.yaw_rate) * alpha;
    body.motion.orientation.yaw = normalize_axis(body.motion.orientation.yaw + body.yaw_rate * dt);

    impact
}
