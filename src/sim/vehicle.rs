//! Per-vehicle movement, dispatched on the host's role

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::authority::AuthoritySimulator;
use super::collision::CollisionQuery;
use super::mover::{valid_dt, MoverTuning};
use super::predictor::ClientPredictor;
use super::reconcile::{ReconcileOutcome, ReconcileTuning, Reconciler};
use super::relay::InputRelay;
use super::rotator::Rotator;
use super::state::{AuthoritativeUpdate, DesiredInput, InputSample, MotionState};
use super::tilt::TiltSmoother;

/// What this host is allowed to do with a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Produces the canonical state
    Authority,
    /// Controls the vehicle but does not own it; predicts and reconciles
    PredictingProxy,
    /// Only displays what the authority sends
    RemoteProxy,
}

/// Everything a tick needs from the surrounding simulation
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    /// Tick length in seconds
    pub dt: f32,
    /// Simulation time at this tick
    pub now: f64,
    /// Active world, `None` while spawning or tearing down
    pub world: Option<&'a dyn CollisionQuery>,
}

/// Authority strategy: integrates the last-known input
pub struct AuthorityDriver {
    simulator: AuthoritySimulator,
}

/// Predicting-proxy strategy: relay, predict, reconcile
pub struct PredictingDriver {
    predictor: ClientPredictor,
    reconciler: Reconciler,
    pending: DesiredInput,
}

/// Remote-proxy strategy: adopts snapshots as they arrive
pub struct RemoteDriver {
    state: MotionState,
}

enum Driver {
    Authority(AuthorityDriver),
    Predicting(PredictingDriver),
    Remote(RemoteDriver),
}

/// One vehicle's movement on one host
pub struct VehicleMover {
    role: Role,
    driver: Driver,
    relay: InputRelay,
    tilt: TiltSmoother,
    body_tilt: Rotator,
    visual_offset: Vec3,
}

impl VehicleMover {
    /// Pick the strategy for `role` once, up front.
    ///
    /// `relay` should be `InputRelay::remote` for a predicting proxy and
    /// `InputRelay::local` otherwise.
    pub fn new(
        role: Role,
        spawn: MotionState,
        tuning: MoverTuning,
        reconcile: ReconcileTuning,
        relay: InputRelay,
    ) -> Self {
        let driver = match role {
            Role::Authority => Driver::Authority(AuthorityDriver {
                simulator: AuthoritySimulator::new(spawn, tuning),
            }),
            Role::PredictingProxy => Driver::Predicting(PredictingDriver {
                predictor: ClientPredictor::new(spawn, tuning, reconcile.history_capacity),
                reconciler: Reconciler::new(reconcile),
                pending: DesiredInput::ZERO,
            }),
            Role::RemoteProxy => Driver::Remote(RemoteDriver { state: spawn }),
        };

        Self {
            role,
            driver,
            relay,
            tilt: TiltSmoother::new(&tuning),
            body_tilt: Rotator::ZERO,
            visual_offset: Vec3::ZERO,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Engine-enable gate; while off every control input is zero
    pub fn set_engine_enabled(&mut self, enabled: bool) {
        self.relay.set_engine_enabled(enabled);
        if !enabled {
            if let Driver::Authority(a) = &mut self.driver {
                a.simulator.set_local_input(DesiredInput::ZERO);
            }
        }
    }

    /// Raw control axes from a controller on this host
    pub fn set_control(&mut self, axes: Vec3, yaw: f32) {
        let input = self.relay.capture(axes, yaw);
        match &mut self.driver {
            Driver::Authority(a) => a.simulator.set_local_input(input),
            Driver::Predicting(p) => p.pending = input,
            Driver::Remote(_) => {}
        }
    }

    /// Input relayed from the controlling client. Only the authority
    /// accepts it.
    pub fn submit_input(&mut self, sample: &InputSample) -> bool {
        let Driver::Authority(a) = &mut self.driver else {
            return false;
        };
        if !self.relay.engine_enabled() {
            let gated = InputSample::new(DesiredInput::ZERO, sample.timestamp);
            return a.simulator.submit_input(&gated);
        }
        a.simulator.submit_input(sample)
    }

    /// Advance one tick. `None` when the tick was skipped for lack of a
    /// world or a usable tick length.
    pub fn tick(&mut self, ctx: &TickContext<'_>) -> Option<MotionState> {
        if ctx.world.is_none() || !valid_dt(ctx.dt) || !ctx.now.is_finite() {
            trace!(role = ?self.role, dt = ctx.dt, "Skipping vehicle tick");
            return None;
        }

        let state = match &mut self.driver {
            Driver::Authority(a) => a.simulator.tick(ctx.dt, ctx.now, ctx.world)?,
            Driver::Predicting(p) => {
                let input = self.relay.gate(p.pending);
                let state = p.predictor.tick(input, ctx.dt, ctx.now, ctx.world);
                self.relay.relay(input, ctx.now);
                self.visual_offset = p.reconciler.visual_offset(ctx.dt);
                state
            }
            Driver::Remote(r) => r.state,
        };

        self.body_tilt = self
            .tilt
            .apply(self.body_tilt, state.velocity, &state.orientation, ctx.dt);

        Some(state)
    }

    /// Subscription point for new authoritative state
    pub fn on_authoritative_state(
        &mut self,
        update: &AuthoritativeUpdate,
        world: Option<&dyn CollisionQuery>,
    ) -> ReconcileOutcome {
        match &mut self.driver {
            Driver::Authority(_) => ReconcileOutcome::Idle,
            Driver::Predicting(p) => {
                let outcome = p
                    .reconciler
                    .on_authoritative_state(update, &mut p.predictor, world);
                self.visual_offset = p.reconciler.pending_offset();
                outcome
            }
            Driver::Remote(r) => {
                if update.state.timestamp < r.state.timestamp {
                    warn!(
                        timestamp = update.state.timestamp,
                        last_applied = r.state.timestamp,
                        "Discarding out-of-order snapshot"
                    );
                    return ReconcileOutcome::Stale;
                }
                r.state = update.state;
                ReconcileOutcome::Idle
            }
        }
    }

    /// Current physics state on this host
    pub fn state(&self) -> MotionState {
        match &self.driver {
            Driver::Authority(a) => *a.simulator.state(),
            Driver::Predicting(p) => *p.predictor.state(),
            Driver::Remote(r) => r.state,
        }
    }

    /// Where to draw the vehicle: physics position plus any correction
    /// still being smoothed out
    pub fn render_position(&self) -> Vec3 {
        self.state().position + self.visual_offset
    }

    /// Cosmetic body pitch/roll relative to the heading
    pub fn body_tilt(&self) -> Rotator {
        self.body_tilt
    }

    /// Newest accepted input timestamp, authority only
    pub fn ack_timestamp(&self) -> Option<f64> {
        match &self.driver {
            Driver::Authority(a) => a.simulator.ack_timestamp(),
            _ => None,
        }
    }

    /// Number of predicted moves awaiting acknowledgement
    pub fn pending_moves(&self) -> usize {
        match &self.driver {
            Driver::Predicting(p) => p.predictor.history().len(),
            _ => 0,
        }
    }
}
