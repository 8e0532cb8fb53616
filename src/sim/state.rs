//! Movement data model shared by every host

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::rotator::Rotator;

/// Control axes for one tick, each in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DesiredInput {
    /// Forward (+) / back (-)
    pub forward: f32,
    /// Right (+) / left (-)
    pub lateral: f32,
    /// Up (+) / down (-)
    pub vertical: f32,
    /// Yaw right (+) / left (-)
    pub yaw: f32,
}

impl DesiredInput {
    pub const ZERO: Self = Self {
        forward: 0.0,
        lateral: 0.0,
        vertical: 0.0,
        yaw: 0.0,
    };

    pub fn new(axes: Vec3, yaw: f32) -> Self {
        Self {
            forward: axes.x,
            lateral: axes.y,
            vertical: axes.z,
            yaw,
        }
    }

    /// Copy with every axis clamped to [-1, 1]
    pub fn clamped(self) -> Self {
        Self {
            forward: self.forward.clamp(-1.0, 1.0),
            lateral: self.lateral.clamp(-1.0, 1.0),
            vertical: self.vertical.clamp(-1.0, 1.0),
            yaw: self.yaw.clamp(-1.0, 1.0),
        }
    }

    pub fn axes(&self) -> Vec3 {
        Vec3::new(self.forward, self.lateral, self.vertical)
    }

    pub fn is_finite(&self) -> bool {
        self.axes().is_finite() && self.yaw.is_finite()
    }
}

/// Input message relayed from a predicting client to the authority
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputSample {
    /// (forward, lateral, vertical) axes
    pub desired_input: Vec3,
    pub desired_yaw: f32,
    /// Client simulation time the input was captured at (seconds)
    pub timestamp: f64,
}

impl InputSample {
    pub fn new(input: DesiredInput, timestamp: f64) -> Self {
        Self {
            desired_input: input.axes(),
            desired_yaw: input.yaw,
            timestamp,
        }
    }

    /// Validate a sample at ingress.
    ///
    /// `last_accepted` is the timestamp of the newest sample already taken;
    /// anything older is stale. Axis values are clamped, not rejected.
    pub fn sanitize(&self, last_accepted: Option<f64>) -> Result<DesiredInput, InputRejected> {
        let input = DesiredInput::new(self.desired_input, self.desired_yaw);
        if !input.is_finite() {
            return Err(InputRejected::NonFinite);
        }
        if !self.timestamp.is_finite() {
            return Err(InputRejected::BadTimestamp(self.timestamp));
        }
        if let Some(last) = last_accepted {
            if self.timestamp < last {
                return Err(InputRejected::Stale {
                    timestamp: self.timestamp,
                    last_accepted: last,
                });
            }
        }
        Ok(input.clamped())
    }
}

/// Reasons an input sample is refused at the authority
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputRejected {
    #[error("input axes are not finite")]
    NonFinite,

    #[error("input timestamp is not finite: {0}")]
    BadTimestamp(f64),

    #[error("input at {timestamp} is older than last accepted {last_accepted}")]
    Stale { timestamp: f64, last_accepted: f64 },
}

/// Point-in-time physical state of a vehicle.
///
/// Also the wire form of the authoritative snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionState {
    pub position: Vec3,
    pub orientation: Rotator,
    pub velocity: Vec3,
    /// Simulation time in seconds
    pub timestamp: f64,
}

impl MotionState {
    pub fn at_rest(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            orientation: Rotator::from_yaw(yaw),
            velocity: Vec3::ZERO,
            timestamp: 0.0,
        }
    }
}

/// Authoritative state as delivered to a proxy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthoritativeUpdate {
    pub state: MotionState,
    /// Timestamp of the newest input the authority had applied
    pub ack_timestamp: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clamps_out_of_range_axes() {
        let sample = InputSample {
            desired_input: Vec3::new(3.0, -7.0, 0.5),
            desired_yaw: 2.0,
            timestamp: 1.0,
        };

        let input = sample.sanitize(None).unwrap();
        assert_eq!(input.forward, 1.0);
        assert_eq!(input.lateral, -1.0);
        assert_eq!(input.vertical, 0.5);
        assert_eq!(input.yaw, 1.0);
    }

    #[test]
    fn test_sanitize_rejects_nan() {
        let sample = InputSample {
            desired_input: Vec3::new(f32::NAN, 0.0, 0.0),
            desired_yaw: 0.0,
            timestamp: 1.0,
        };
        assert_eq!(sample.sanitize(None), Err(InputRejected::NonFinite));
    }

    #[test]
    fn test_sanitize_rejects_older_sample() {
        let sample = InputSample::new(DesiredInput::ZERO, 1.0);
        assert!(matches!(
            sample.sanitize(Some(2.0)),
            Err(InputRejected::Stale { .. })
        ));
        assert!(sample.sanitize(Some(1.0)).is_ok());
    }

    #[test]
    fn test_sample_wire_format() {
        let sample = InputSample::new(DesiredInput::new(Vec3::new(1.0, 0.0, 0.0), -0.5), 3.25);
        let json = serde_json::to_string(&sample).unwrap();
        let back: InputSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }
}
