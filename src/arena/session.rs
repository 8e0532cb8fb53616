//! Arena state and authoritative tick loop

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ArenaSettings;
use crate::sim::relay::InputRelay;
use crate::sim::{
    MotionState, MoverTuning, ReconcileTuning, Role, StaticWorld, TickContext, VehicleMover,
};
use crate::util::time::{tick_delta, tick_duration, unix_millis};
use crate::ws::protocol::{ClientMsg, ServerMsg, VehicleSnapshot};

use super::snapshot::SnapshotBuilder;
use super::ArenaInput;

/// Seconds an arena may sit empty before it shuts down
pub const IDLE_SHUTDOWN_SECS: u32 = 30;

/// Inputs queued longer than this are logged
pub const SLOW_INPUT_MS: u64 = 100;

/// Arena state (owned by the arena task)
pub struct ArenaState {
    pub id: Uuid,
    pub seed: u64,
    pub tick: u64,
    /// Simulation clock in seconds
    pub clock: f64,
    pub vehicles: HashMap<Uuid, VehicleMover>,
    pub world: StaticWorld,
    pub rng: ChaCha8Rng,
    pub settings: ArenaSettings,
    pub mover: MoverTuning,
}

impl ArenaState {
    pub fn new(id: Uuid, seed: u64, settings: ArenaSettings, mover: MoverTuning) -> Self {
        Self {
            id,
            seed,
            tick: 0,
            clock: 0.0,
            vehicles: HashMap::new(),
            world: StaticWorld::arena(settings.half_extent),
            rng: ChaCha8Rng::seed_from_u64(seed),
            settings,
            mover,
        }
    }

    /// Generate a resting spawn state inside the walls
    pub fn generate_spawn(&mut self) -> MotionState {
        // Keep clear of the walls by a few collision radii
        let margin = (self.mover.collision_radius * 4.0).min(self.settings.half_extent * 0.5);
        let reach = (self.settings.half_extent - margin).max(0.0);
        let x = if reach > 0.0 { self.rng.gen_range(-reach..reach) } else { 0.0 };
        let y = if reach > 0.0 { self.rng.gen_range(-reach..reach) } else { 0.0 };
        let yaw = self.rng.gen_range(-180.0..180.0);
        let height = self.settings.spawn_height.max(self.mover.collision_radius);

        let mut state = MotionState::at_rest(Vec3::new(x, y, height), yaw);
        state.timestamp = self.clock;
        state
    }

    fn snapshots(&self) -> Vec<VehicleSnapshot> {
        self.vehicles
            .iter()
            .map(|(id, mover)| VehicleSnapshot {
                vehicle_id: *id,
                state: mover.state(),
                ack_timestamp: mover.ack_timestamp(),
            })
            .collect()
    }
}

/// Handle to a running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<ArenaInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    pub vehicle_count: Arc<AtomicUsize>,
    pub max_vehicles: usize,
}

impl ArenaHandle {
    pub fn vehicle_count(&self) -> usize {
        self.vehicle_count.load(Ordering::Relaxed)
    }

    pub fn has_room(&self) -> bool {
        self.vehicle_count() < self.max_vehicles
    }
}

/// The authoritative arena simulation
pub struct ArenaSession {
    state: ArenaState,
    input_rx: mpsc::Receiver<ArenaInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    vehicle_count: Arc<AtomicUsize>,
    reconcile: ReconcileTuning,
    idle_ticks: u32,
    disconnected: bool,
}

impl ArenaSession {
    /// Create a new arena
    pub fn new(
        id: Uuid,
        seed: u64,
        settings: ArenaSettings,
        mover: MoverTuning,
        reconcile: ReconcileTuning,
    ) -> (Self, ArenaHandle) {
        let (input_tx, input_rx) = mpsc::channel(1024);
        let (snapshot_tx, _) = broadcast::channel(64);
        let vehicle_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            id,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            vehicle_count: vehicle_count.clone(),
            max_vehicles: settings.max_vehicles,
        };

        let session = Self {
            state: ArenaState::new(id, seed, settings, mover),
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(settings.snapshot_interval()),
            vehicle_count,
            reconcile,
            idle_ticks: 0,
            disconnected: false,
        };

        (session, handle)
    }

    pub fn state(&self) -> &ArenaState {
        &self.state
    }

    /// Run the authoritative tick loop until the arena empties out
    pub async fn run(mut self) {
        info!(
            arena_id = %self.state.id,
            seed = self.state.seed,
            tps = self.state.settings.simulation_tps,
            "Arena started"
        );

        let mut tick_interval = interval(tick_duration(self.state.settings.simulation_tps));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            if !self.step() {
                break;
            }
        }

        info!(arena_id = %self.state.id, ticks = self.state.tick, "Arena stopped");
    }

    /// One full tick: drain inputs, simulate, maybe broadcast. Returns
    /// false once the arena should shut down.
    pub fn step(&mut self) -> bool {
        self.process_inputs();
        self.run_tick();

        if self.snapshot_builder.should_send() {
            if let Some(snapshot) = self
                .snapshot_builder
                .build_delta(self.state.tick, self.state.snapshots())
            {
                // No subscribers is fine
                let _ = self.snapshot_tx.send(snapshot);
            }
        }

        if self.disconnected {
            info!(arena_id = %self.state.id, "Input channel closed, ending arena");
            return false;
        }

        if self.state.vehicles.is_empty() {
            self.idle_ticks += 1;
            let limit = IDLE_SHUTDOWN_SECS.saturating_mul(self.state.settings.simulation_tps);
            if self.idle_ticks >= limit {
                info!(arena_id = %self.state.id, "Arena idle, ending");
                return false;
            }
        } else {
            self.idle_ticks = 0;
        }

        true
    }

    /// Process all pending messages from connections
    fn process_inputs(&mut self) {
        let now = unix_millis();
        loop {
            let input = match self.input_rx.try_recv() {
                Ok(input) => input,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            };

            let queued_ms = input.queued_ms(now);
            if queued_ms > SLOW_INPUT_MS {
                debug!(
                    arena_id = %self.state.id,
                    vehicle_id = %input.vehicle_id,
                    queued_ms,
                    "Input waited long in arena queue"
                );
            }

            match input.msg {
                ClientMsg::Spawn => self.handle_spawn(input.vehicle_id),
                ClientMsg::Input(sample) => {
                    if let Some(vehicle) = self.state.vehicles.get_mut(&input.vehicle_id) {
                        vehicle.submit_input(&sample);
                    } else {
                        debug!(vehicle_id = %input.vehicle_id, "Input for unspawned vehicle");
                    }
                }
                ClientMsg::Engine { enabled } => {
                    if let Some(vehicle) = self.state.vehicles.get_mut(&input.vehicle_id) {
                        vehicle.set_engine_enabled(enabled);
                        debug!(vehicle_id = %input.vehicle_id, enabled, "Engine toggled");
                    }
                }
                ClientMsg::Ping { t } => {
                    let _ = self.snapshot_tx.send(ServerMsg::Pong {
                        vehicle_id: input.vehicle_id,
                        t,
                    });
                }
                ClientMsg::Leave => self.handle_leave(input.vehicle_id, "left"),
            }
        }
    }

    fn handle_spawn(&mut self, vehicle_id: Uuid) {
        if self.state.vehicles.contains_key(&vehicle_id) {
            warn!(arena_id = %self.state.id, vehicle_id = %vehicle_id, "Vehicle already spawned");
            return;
        }

        if self.state.vehicles.len() >= self.state.settings.max_vehicles {
            let _ = self.snapshot_tx.send(ServerMsg::Error {
                vehicle_id: Some(vehicle_id),
                code: "arena_full".to_string(),
                message: "Arena is full".to_string(),
            });
            return;
        }

        let spawn = self.state.generate_spawn();
        let mover = VehicleMover::new(
            Role::Authority,
            spawn,
            self.state.mover,
            self.reconcile,
            InputRelay::local(),
        );
        self.state.vehicles.insert(vehicle_id, mover);
        self.vehicle_count
            .store(self.state.vehicles.len(), Ordering::Relaxed);

        let _ = self.snapshot_tx.send(ServerMsg::Spawned {
            vehicle_id,
            state: spawn,
        });
        self.snapshot_builder.force_next();

        info!(
            arena_id = %self.state.id,
            vehicle_id = %vehicle_id,
            vehicle_count = self.state.vehicles.len(),
            "Vehicle spawned"
        );
    }

    fn handle_leave(&mut self, vehicle_id: Uuid, reason: &str) {
        if self.state.vehicles.remove(&vehicle_id).is_none() {
            return;
        }
        self.vehicle_count
            .store(self.state.vehicles.len(), Ordering::Relaxed);
        self.snapshot_builder.forget(&vehicle_id);

        let _ = self.snapshot_tx.send(ServerMsg::VehicleLeft {
            vehicle_id,
            reason: reason.to_string(),
        });

        info!(arena_id = %self.state.id, vehicle_id = %vehicle_id, reason, "Vehicle left arena");
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        let dt = tick_delta(self.state.settings.simulation_tps);
        self.state.tick += 1;
        self.state.clock += dt as f64;

        let ctx = TickContext {
            dt,
            now: self.state.clock,
            world: Some(&self.state.world),
        };
        for vehicle in self.state.vehicles.values_mut() {
            vehicle.tick(&ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{DesiredInput, InputSample};

    fn settings() -> ArenaSettings {
        ArenaSettings {
            simulation_tps: 60,
            snapshot_tps: 20,
            max_vehicles: 2,
            half_extent: 10_000.0,
            spawn_height: 400.0,
        }
    }

    fn arena() -> (ArenaSession, ArenaHandle) {
        ArenaSession::new(
            Uuid::new_v4(),
            7,
            settings(),
            MoverTuning::default(),
            ReconcileTuning::default(),
        )
    }

    async fn send(handle: &ArenaHandle, vehicle_id: Uuid, msg: ClientMsg) {
        let input = ArenaInput {
            vehicle_id,
            msg,
            received_at: unix_millis(),
        };
        tokio_test::assert_ok!(handle.input_tx.send(input).await);
    }

    #[tokio::test]
    async fn test_spawn_is_announced() {
        let (mut session, handle) = arena();
        let mut rx = handle.snapshot_tx.subscribe();
        let id = Uuid::new_v4();

        send(&handle, id, ClientMsg::Spawn).await;
        assert!(session.step());

        match rx.try_recv().unwrap() {
            ServerMsg::Spawned { vehicle_id, state } => {
                assert_eq!(vehicle_id, id);
                assert!(state.position.x.abs() < 10_000.0);
                assert!(state.position.z >= 400.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(handle.vehicle_count(), 1);
    }

    #[tokio::test]
    async fn test_full_arena_rejects_spawn() {
        let (mut session, handle) = arena();
        let mut rx = handle.snapshot_tx.subscribe();

        for _ in 0..2 {
            send(&handle, Uuid::new_v4(), ClientMsg::Spawn).await;
        }
        let late = Uuid::new_v4();
        send(&handle, late, ClientMsg::Spawn).await;
        session.step();

        let mut rejected = false;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Error { vehicle_id, code, .. } = msg {
                assert_eq!(vehicle_id, Some(late));
                assert_eq!(code, "arena_full");
                rejected = true;
            }
        }
        assert!(rejected);
        assert_eq!(handle.vehicle_count(), 2);
        assert!(!handle.has_room());
    }

    #[tokio::test]
    async fn test_input_moves_vehicle_and_is_acknowledged() {
        let (mut session, handle) = arena();
        let mut rx = handle.snapshot_tx.subscribe();
        let id = Uuid::new_v4();

        send(&handle, id, ClientMsg::Spawn).await;
        session.step();
        let start = session.state().vehicles[&id].state().position;

        let sample = InputSample::new(DesiredInput::new(Vec3::X, 0.0), 1.0);
        send(&handle, id, ClientMsg::Input(sample)).await;
        for _ in 0..30 {
            session.step();
        }

        let vehicle = &session.state().vehicles[&id];
        assert_ne!(vehicle.state().position, start);
        assert_eq!(vehicle.ack_timestamp(), Some(1.0));

        let mut acked = false;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Snapshot { vehicles, .. } = msg {
                acked |= vehicles
                    .iter()
                    .any(|v| v.vehicle_id == id && v.ack_timestamp == Some(1.0));
            }
        }
        assert!(acked);
    }

    #[tokio::test]
    async fn test_leave_removes_vehicle() {
        let (mut session, handle) = arena();
        let mut rx = handle.snapshot_tx.subscribe();
        let id = Uuid::new_v4();

        send(&handle, id, ClientMsg::Spawn).await;
        send(&handle, id, ClientMsg::Leave).await;
        session.step();

        assert_eq!(handle.vehicle_count(), 0);
        let left = std::iter::from_fn(|| rx.try_recv().ok())
            .any(|msg| matches!(msg, ServerMsg::VehicleLeft { vehicle_id, .. } if vehicle_id == id));
        assert!(left);
    }

    #[tokio::test]
    async fn test_pong_is_addressed() {
        let (mut session, handle) = arena();
        let mut rx = handle.snapshot_tx.subscribe();
        let id = Uuid::new_v4();

        send(&handle, id, ClientMsg::Ping { t: 42 }).await;
        session.step();

        let pong = rx.try_recv().unwrap();
        assert_eq!(pong.recipient(), Some(id));
        assert!(matches!(pong, ServerMsg::Pong { t: 42, .. }));
    }

    #[tokio::test]
    async fn test_late_input_is_still_applied() {
        let (mut session, handle) = arena();
        let id = Uuid::new_v4();

        let stale = ArenaInput {
            vehicle_id: id,
            msg: ClientMsg::Spawn,
            received_at: 0,
        };
        assert!(stale.queued_ms(unix_millis()) > SLOW_INPUT_MS);
        tokio_test::assert_ok!(handle.input_tx.send(stale).await);
        session.step();

        assert_eq!(handle.vehicle_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_handle_ends_arena() {
        let (mut session, handle) = arena();
        drop(handle);
        assert!(!session.step());
    }

    #[test]
    fn test_spawns_are_seeded() {
        let mut a = ArenaState::new(Uuid::nil(), 99, settings(), MoverTuning::default());
        let mut b = ArenaState::new(Uuid::nil(), 99, settings(), MoverTuning::default());
        assert_eq!(a.generate_spawn(), b.generate_spawn());
    }
}
