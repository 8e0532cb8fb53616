//! Rotor Net - rotorcraft movement with authoritative simulation, client
//! prediction and reconciliation.
//!
//! `sim` holds the movement core every host runs. The remaining modules
//! host it as an authoritative arena server.

pub mod app;
pub mod arena;
pub mod config;
pub mod http;
pub mod sim;
pub mod util;
pub mod ws;
