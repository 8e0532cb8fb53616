//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::sim::{MoverTuning, ReconcileTuning};
use crate::util::time::{DEFAULT_SIMULATION_TPS, DEFAULT_SNAPSHOT_TPS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Allowed client origins for CORS, comma-separated; `*` allows any
    pub client_origin: String,

    /// Arena simulation settings
    pub arena: ArenaSettings,
    /// Movement tunables, shared with clients on connect
    pub mover: MoverTuning,
    /// Correction tunables handed to predicting clients
    pub reconcile: ReconcileTuning,
}

/// Per-arena simulation settings
#[derive(Clone, Copy, Debug)]
pub struct ArenaSettings {
    /// Authority ticks per second
    pub simulation_tps: u32,
    /// Snapshots per second
    pub snapshot_tps: u32,
    /// Vehicles allowed in one arena
    pub max_vehicles: usize,
    /// Distance from the arena center to each wall
    pub half_extent: f32,
    /// Height above ground new vehicles spawn at
    pub spawn_height: f32,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            simulation_tps: DEFAULT_SIMULATION_TPS,
            snapshot_tps: DEFAULT_SNAPSHOT_TPS,
            max_vehicles: 32,
            half_extent: 20_000.0,
            spawn_height: 400.0,
        }
    }
}

impl ArenaSettings {
    /// Simulation ticks between two snapshots
    pub fn snapshot_interval(&self) -> u32 {
        (self.simulation_tps / self.snapshot_tps.max(1)).max(1)
    }

    /// Reject settings the arena cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation_tps == 0 {
            return Err(ConfigError::OutOfRange("SIMULATION_TPS"));
        }
        if self.snapshot_tps == 0 || self.snapshot_tps > self.simulation_tps {
            return Err(ConfigError::OutOfRange("SNAPSHOT_TPS"));
        }
        if self.max_vehicles == 0 {
            return Err(ConfigError::OutOfRange("MAX_VEHICLES_PER_ARENA"));
        }
        // Also catches NaN
        if !(self.half_extent.is_finite() && self.half_extent > 0.0) {
            return Err(ConfigError::OutOfRange("ARENA_HALF_EXTENT"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins when the host provides one, then SERVER_ADDR
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let arena_defaults = ArenaSettings::default();
        let arena = ArenaSettings {
            simulation_tps: env_or("SIMULATION_TPS", arena_defaults.simulation_tps)?,
            snapshot_tps: env_or("SNAPSHOT_TPS", arena_defaults.snapshot_tps)?,
            max_vehicles: env_or("MAX_VEHICLES_PER_ARENA", arena_defaults.max_vehicles)?,
            half_extent: env_or("ARENA_HALF_EXTENT", arena_defaults.half_extent)?,
            spawn_height: env_or("ARENA_SPAWN_HEIGHT", arena_defaults.spawn_height)?,
        };
        arena.validate()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json")),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            arena,
            mover: mover_from_env()?,
            reconcile: reconcile_from_env()?,
        })
    }
}

fn mover_from_env() -> Result<MoverTuning, ConfigError> {
    let d = MoverTuning::default();
    let tuning = MoverTuning {
        max_forward_speed: env_or("MOVER_MAX_FORWARD_SPEED", d.max_forward_speed)?,
        max_lateral_speed: env_or("MOVER_MAX_LATERAL_SPEED", d.max_lateral_speed)?,
        max_vertical_speed: env_or("MOVER_MAX_VERTICAL_SPEED", d.max_vertical_speed)?,
        yaw_speed: env_or("MOVER_YAW_SPEED", d.yaw_speed)?,
        velocity_damping: env_or("MOVER_VELOCITY_DAMPING", d.velocity_damping)?,
        max_tilt_angle: env_or("MOVER_MAX_TILT_ANGLE", d.max_tilt_angle)?,
        tilt_smoothing_rate: env_or("MOVER_TILT_SMOOTHING_RATE", d.tilt_smoothing_rate)?,
        bounce_damping: env_or("MOVER_BOUNCE_DAMPING", d.bounce_damping)?,
        surface_friction: env_or("MOVER_SURFACE_FRICTION", d.surface_friction)?,
        skid_velocity_threshold: env_or("MOVER_SKID_VELOCITY_THRESHOLD", d.skid_velocity_threshold)?,
        impact_offset: env_or("MOVER_IMPACT_OFFSET", d.impact_offset)?,
        collision_radius: env_or("MOVER_COLLISION_RADIUS", d.collision_radius)?,
    };

    if !(0.0..=1.0).contains(&tuning.velocity_damping) {
        return Err(ConfigError::OutOfRange("MOVER_VELOCITY_DAMPING"));
    }
    if !(0.0..1.0).contains(&tuning.bounce_damping) {
        return Err(ConfigError::OutOfRange("MOVER_BOUNCE_DAMPING"));
    }
    if !(0.0..1.0).contains(&tuning.surface_friction) {
        return Err(ConfigError::OutOfRange("MOVER_SURFACE_FRICTION"));
    }
    Ok(tuning)
}

fn reconcile_from_env() -> Result<ReconcileTuning, ConfigError> {
    let d = ReconcileTuning::default();
    Ok(ReconcileTuning {
        position_deadband: env_or("RECONCILE_POSITION_DEADBAND", d.position_deadband)?,
        rotation_deadband: env_or("RECONCILE_ROTATION_DEADBAND", d.rotation_deadband)?,
        correction_rate: env_or("RECONCILE_CORRECTION_RATE", d.correction_rate)?,
        max_correction_secs: env_or("RECONCILE_MAX_CORRECTION_SECS", d.max_correction_secs)?,
        history_capacity: env_or("RECONCILE_HISTORY_CAPACITY", d.history_capacity)?,
        replay_sweeps: env_or("RECONCILE_REPLAY_SWEEPS", d.replay_sweeps)?,
    })
}

/// Read and parse `name`, falling back to `default` when unset
fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_var(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Value out of range: {0}")]
    OutOfRange(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_accepts_padded_numbers() {
        let value: f32 = parse_var("X", " 12.5 ").unwrap();
        assert_eq!(value, 12.5);
    }

    #[test]
    fn test_parse_var_reports_name() {
        let err = parse_var::<u32>("SIMULATION_TPS", "fast").unwrap_err();
        assert!(err.to_string().contains("SIMULATION_TPS"));
    }

    #[test]
    fn test_snapshot_interval() {
        let settings = ArenaSettings {
            simulation_tps: 60,
            snapshot_tps: 20,
            ..ArenaSettings::default()
        };
        assert_eq!(settings.snapshot_interval(), 3);
    }

    #[test]
    fn test_default_arena_settings_are_valid() {
        assert!(ArenaSettings::default().validate().is_ok());
    }

    #[test]
    fn test_empty_arena_limit_is_rejected() {
        let settings = ArenaSettings {
            max_vehicles: 0,
            ..ArenaSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::OutOfRange("MAX_VEHICLES_PER_ARENA"))
        ));
    }

    #[test]
    fn test_non_positive_extent_is_rejected() {
        for half_extent in [0.0, -500.0, f32::NAN] {
            let settings = ArenaSettings {
                half_extent,
                ..ArenaSettings::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(ConfigError::OutOfRange("ARENA_HALF_EXTENT"))
            ));
        }
    }
}
