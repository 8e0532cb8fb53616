//! Rotorcraft movement: authority, prediction and reconciliation

pub mod authority;
pub mod collision;
pub mod history;
pub mod mover;
pub mod predictor;
pub mod reconcile;
pub mod relay;
pub mod rotator;
pub mod state;
pub mod tilt;
pub mod vehicle;

pub use collision::{CollisionQuery, StaticWorld};
pub use mover::MoverTuning;
pub use reconcile::ReconcileTuning;
pub use rotator::Rotator;
pub use state::{AuthoritativeUpdate, DesiredInput, InputSample, MotionState};
pub use vehicle::{Role, TickContext, VehicleMover};
