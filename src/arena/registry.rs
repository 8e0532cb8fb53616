//! Registry of running arenas

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::ArenaSettings;
use crate::sim::{MoverTuning, ReconcileTuning};

use super::session::{ArenaHandle, ArenaSession};

/// Public summary of one arena
#[derive(Debug, Clone, Serialize)]
pub struct ArenaSummary {
    pub arena_id: Uuid,
    pub vehicles: usize,
    pub max_vehicles: usize,
}

impl From<&ArenaHandle> for ArenaSummary {
    fn from(handle: &ArenaHandle) -> Self {
        Self {
            arena_id: handle.id,
            vehicles: handle.vehicle_count(),
            max_vehicles: handle.max_vehicles,
        }
    }
}

/// Registry of all active arenas
pub struct ArenaRegistry {
    arenas: DashMap<Uuid, ArenaHandle>,
    settings: ArenaSettings,
    mover: MoverTuning,
    reconcile: ReconcileTuning,
}

impl ArenaRegistry {
    pub fn new(settings: ArenaSettings, mover: MoverTuning, reconcile: ReconcileTuning) -> Self {
        Self {
            arenas: DashMap::new(),
            settings,
            mover,
            reconcile,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<ArenaHandle> {
        self.arenas.get(id).map(|a| a.value().clone())
    }

    pub fn insert(&self, handle: ArenaHandle) {
        self.arenas.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<ArenaHandle> {
        self.arenas.remove(id).map(|(_, h)| h)
    }

    pub fn active_arenas(&self) -> usize {
        self.arenas.len()
    }

    pub fn total_vehicles(&self) -> usize {
        self.arenas.iter().map(|a| a.value().vehicle_count()).sum()
    }

    pub fn list(&self) -> Vec<ArenaSummary> {
        self.arenas.iter().map(|a| ArenaSummary::from(a.value())).collect()
    }

    /// Find an arena with a free slot
    pub fn find_available(&self) -> Option<ArenaHandle> {
        self.arenas
            .iter()
            .find(|a| a.value().has_room())
            .map(|a| a.value().clone())
    }

    /// Join an arena with room, starting a new one when all are full.
    /// Must be called from within a tokio runtime.
    pub fn find_or_spawn(self: &Arc<Self>) -> ArenaHandle {
        if let Some(handle) = self.find_available() {
            return handle;
        }
        self.spawn_arena()
    }

    /// Start a new arena task; it unregisters itself when it ends
    pub fn spawn_arena(self: &Arc<Self>) -> ArenaHandle {
        let id = Uuid::new_v4();
        let seed = rand::random::<u64>();
        let (session, handle) =
            ArenaSession::new(id, seed, self.settings, self.mover, self.reconcile);
        self.insert(handle.clone());

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            session.run().await;
            registry.remove(&id);
            info!(arena_id = %id, "Arena unregistered");
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaInput;
    use crate::ws::protocol::ClientMsg;

    fn registry(max_vehicles: usize) -> Arc<ArenaRegistry> {
        let settings = ArenaSettings {
            max_vehicles,
            ..ArenaSettings::default()
        };
        Arc::new(ArenaRegistry::new(
            settings,
            MoverTuning::default(),
            ReconcileTuning::default(),
        ))
    }

    #[tokio::test]
    async fn test_find_or_spawn_reuses_arena_with_room() {
        let arenas = registry(4);
        let first = arenas.find_or_spawn();
        let second = arenas.find_or_spawn();
        assert_eq!(first.id, second.id);
        assert_eq!(arenas.active_arenas(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_arena_starts_another() {
        let arenas = registry(1);
        let first = arenas.find_or_spawn();
        first
            .input_tx
            .send(ArenaInput {
                vehicle_id: Uuid::new_v4(),
                msg: ClientMsg::Spawn,
                received_at: 0,
            })
            .await
            .unwrap();

        // Let the arena process the spawn
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(arenas.total_vehicles(), 1);

        let second = arenas.find_or_spawn();
        assert_ne!(first.id, second.id);
        assert_eq!(arenas.list().len(), 2);
    }
}
