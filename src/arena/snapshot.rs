//! Snapshot building: only changed vehicle states go on the wire

use std::collections::HashMap;
use uuid::Uuid;

use crate::ws::protocol::{ServerMsg, VehicleSnapshot};

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    /// Last state sent per vehicle
    last_sent: HashMap<Uuid, VehicleSnapshot>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            last_sent: HashMap::new(),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for spawns)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot holding the vehicles whose state changed since they
    /// were last sent. `None` when nothing changed.
    pub fn build_delta<I>(&mut self, tick: u64, current: I) -> Option<ServerMsg>
    where
        I: IntoIterator<Item = VehicleSnapshot>,
    {
        let mut changed = Vec::new();
        for snapshot in current {
            if self.last_sent.get(&snapshot.vehicle_id) != Some(&snapshot) {
                self.last_sent.insert(snapshot.vehicle_id, snapshot.clone());
                changed.push(snapshot);
            }
        }

        if changed.is_empty() {
            return None;
        }

        Some(ServerMsg::Snapshot {
            tick,
            vehicles: changed,
        })
    }

    /// Forget a vehicle so a respawn is always sent in full
    pub fn forget(&mut self, vehicle_id: &Uuid) {
        self.last_sent.remove(vehicle_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MotionState;
    use glam::Vec3;

    fn snapshot(id: Uuid, x: f32) -> VehicleSnapshot {
        VehicleSnapshot {
            vehicle_id: id,
            state: MotionState::at_rest(Vec3::new(x, 0.0, 0.0), 0.0),
            ack_timestamp: None,
        }
    }

    #[test]
    fn test_interval_gates_sending() {
        let mut builder = SnapshotBuilder::new(3);
        let sent: Vec<bool> = (0..6).map(|_| builder.should_send()).collect();
        assert_eq!(sent, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_unchanged_vehicles_are_skipped() {
        let mut builder = SnapshotBuilder::new(1);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = builder.build_delta(1, vec![snapshot(a, 0.0), snapshot(b, 0.0)]);
        assert!(matches!(first, Some(ServerMsg::Snapshot { ref vehicles, .. }) if vehicles.len() == 2));

        let second = builder.build_delta(2, vec![snapshot(a, 0.0), snapshot(b, 5.0)]);
        match second {
            Some(ServerMsg::Snapshot { vehicles, .. }) => {
                assert_eq!(vehicles.len(), 1);
                assert_eq!(vehicles[0].vehicle_id, b);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(builder.build_delta(3, vec![snapshot(a, 0.0), snapshot(b, 5.0)]).is_none());
    }

    #[test]
    fn test_forgotten_vehicle_is_resent() {
        let mut builder = SnapshotBuilder::new(1);
        let a = Uuid::new_v4();
        builder.build_delta(1, vec![snapshot(a, 1.0)]);
        builder.forget(&a);
        assert!(builder.build_delta(2, vec![snapshot(a, 1.0)]).is_some());
    }
}
