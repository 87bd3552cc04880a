//! Router wiring, mirroring the teacher's `build_router` shape: a plain
//! `Router::new()` with one `.route` per control verb, a permissive CORS
//! layer for the read endpoints, and `AppState` bound once at the end.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/projects/:project_id/periods/:period_date/start", post(handlers::start))
        .route("/runs/:run_id", get(handlers::status))
        .route("/runs/:run_id/phases", get(handlers::phases))
        .route("/runs/:run_id/activity", get(handlers::activity))
        .route("/runs/:run_id/resume", post(handlers::resume))
        .route("/runs/:run_id/cancel", post(handlers::cancel))
        .route("/runs/:run_id/phases/:phase_name/force-complete", post(handlers::force_complete))
        .route(
            "/webhooks/serp/:project_id/:period_date",
            post(handlers::webhook),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
