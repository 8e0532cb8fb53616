//! Time utilities for the simulation loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default tick rates
pub const DEFAULT_SIMULATION_TPS: u32 = 60;
pub const DEFAULT_SNAPSHOT_TPS: u32 = 20;

/// Tick length in seconds for a simulation rate
pub fn tick_delta(tps: u32) -> f32 {
    1.0 / tps.max(1) as f32
}

/// Wall-clock length of one tick
pub fn tick_duration(tps: u32) -> Duration {
    Duration::from_micros(1_000_000 / tps.max(1) as u64)
}
