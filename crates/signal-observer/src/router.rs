//! Axum router construction for the HTTP adapter.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::operator;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/schedules` -- `WebSocket` schedule stream
/// - `GET /api/schedule` -- schedule in force
/// - `POST /api/timings` -- one-shot allocation
/// - `POST /api/observations` -- queue a batch for the run loop
/// - `/api/operator/*` -- run loop controls
///
/// CORS allows any origin so dashboards served elsewhere can poll.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/schedules", get(ws::ws_schedules))
        // REST API
        .route("/api/schedule", get(handlers::get_schedule))
        .route("/api/timings", post(handlers::post_timings))
        .route("/api/observations", post(handlers::post_observations))
        // Operator controls
        .route("/api/operator/pause", post(operator::pause))
        .route("/api/operator/resume", post(operator::resume))
        .route("/api/operator/speed", post(operator::set_speed))
        .route("/api/operator/trigger", post(operator::trigger))
        .route("/api/operator/status", get(operator::status))
        .route("/api/operator/stop", post(operator::stop))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
