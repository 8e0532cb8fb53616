//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::arena::ArenaSummary;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.client_origin))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/arenas", get(arenas_handler))
        .route("/arenas/:id", get(arena_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Comma-separated origins; `*` allows any
fn allowed_origins(raw: &str) -> AllowOrigin {
    if raw.split(',').any(|s| s.trim() == "*") {
        return AllowOrigin::from(Any);
    }
    let origins: Vec<HeaderValue> = raw
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    AllowOrigin::list(origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_arenas: usize,
    active_vehicles: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_arenas: state.arenas.active_arenas(),
        active_vehicles: state.arenas.total_vehicles(),
    })
}

// ============================================================================
// Arena endpoints
// ============================================================================

#[derive(Serialize)]
struct ArenasResponse {
    arenas: Vec<ArenaSummary>,
}

async fn arenas_handler(State(state): State<AppState>) -> Json<ArenasResponse> {
    Json(ArenasResponse {
        arenas: state.arenas.list(),
    })
}

async fn arena_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArenaSummary>, AppError> {
    state
        .arenas
        .get(&id)
        .map(|handle| Json(ArenaSummary::from(&handle)))
        .ok_or_else(|| AppError::NotFound(format!("arena {}", id)))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("arena".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_full_arena_maps_to_503() {
        let response = AppError::Unavailable("full".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
