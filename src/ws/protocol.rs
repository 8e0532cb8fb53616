//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sim::{InputSample, MotionState, MoverTuning, ReconcileTuning};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Spawn this connection's vehicle
    Spawn,

    /// Control input for one client tick
    Input(InputSample),

    /// Engine switched on or off
    Engine { enabled: bool },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Despawn and leave the arena
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        vehicle_id: Uuid,
        arena_id: Uuid,
        server_time: u64,
        simulation_tps: u32,
        /// Movement tunables the client must predict with
        mover: MoverTuning,
        /// Suggested correction tunables
        reconcile: ReconcileTuning,
    },

    /// Vehicle placed in the arena
    Spawned {
        vehicle_id: Uuid,
        state: MotionState,
    },

    /// Authoritative states that changed since the previous snapshot
    Snapshot {
        tick: u64,
        vehicles: Vec<VehicleSnapshot>,
    },

    /// Vehicle removed from the arena
    VehicleLeft {
        vehicle_id: Uuid,
        reason: String,
    },

    /// Error message
    Error {
        vehicle_id: Option<Uuid>,
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        vehicle_id: Uuid,
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// The one vehicle this message is meant for, if it is not a broadcast
    pub fn recipient(&self) -> Option<Uuid> {
        match self {
            ServerMsg::Welcome { vehicle_id, .. } | ServerMsg::Pong { vehicle_id, .. } => {
                Some(*vehicle_id)
            }
            ServerMsg::Error { vehicle_id, .. } => *vehicle_id,
            ServerMsg::Spawned { .. }
            | ServerMsg::Snapshot { .. }
            | ServerMsg::VehicleLeft { .. } => None,
        }
    }
}

/// One vehicle's authoritative state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub vehicle_id: Uuid,
    pub state: MotionState,
    /// Timestamp of the newest input the authority applied for this vehicle
    pub ack_timestamp: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_message_parses() {
        let json = r#"{"type":"input","desired_input":[1.0,0.0,-0.5],"desired_yaw":0.25,"timestamp":12.5}"#;
        match serde_json::from_str::<ClientMsg>(json).unwrap() {
            ClientMsg::Input(sample) => {
                assert_eq!(sample.desired_input.x, 1.0);
                assert_eq!(sample.desired_input.z, -0.5);
                assert_eq!(sample.desired_yaw, 0.25);
                assert_eq!(sample.timestamp, 12.5);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_engine_message_parses() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"engine","enabled":false}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Engine { enabled: false }));
    }

    #[test]
    fn test_snapshot_is_broadcast_and_pong_is_targeted() {
        let id = Uuid::new_v4();
        let snapshot = ServerMsg::Snapshot {
            tick: 1,
            vehicles: Vec::new(),
        };
        assert_eq!(snapshot.recipient(), None);
        assert_eq!(ServerMsg::Pong { vehicle_id: id, t: 7 }.recipient(), Some(id));
    }
}
