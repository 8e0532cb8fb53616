//! Application state shared across routes

use std::sync::Arc;

use crate::arena::ArenaRegistry;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arenas: Arc<ArenaRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let arenas = Arc::new(ArenaRegistry::new(
            config.arena,
            config.mover,
            config.reconcile,
        ));

        Self { config, arenas }
    }
}
