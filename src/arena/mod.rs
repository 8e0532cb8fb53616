//! Arena hosting: one authoritative simulation per arena

pub mod registry;
pub mod session;
pub mod snapshot;

pub use registry::{ArenaRegistry, ArenaSummary};
pub use session::{ArenaHandle, ArenaSession};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Message received from a connection, tagged with its vehicle
#[derive(Debug, Clone)]
pub struct ArenaInput {
    pub vehicle_id: Uuid,
    pub msg: ClientMsg,
    /// Unix millis when the connection read it
    pub received_at: u64,
}

impl ArenaInput {
    /// Milliseconds spent waiting between the socket and the arena
    pub fn queued_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.received_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_ms() {
        let input = ArenaInput {
            vehicle_id: Uuid::nil(),
            msg: ClientMsg::Leave,
            received_at: 1_000,
        };
        assert_eq!(input.queued_ms(1_250), 250);
        // Clock stepped backwards
        assert_eq!(input.queued_ms(900), 0);
    }
}
