use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{handlers, imports, maintenance};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Imports
        .route("/imports", post(imports::create_import))
        .route("/imports", get(imports::list_imports))
        .route("/imports/{id}", get(imports::get_import_status))
        .route("/imports/{id}/restart", post(imports::restart_import))
        // Maintenance
        .route("/maintenance/content-types", post(maintenance::run_content_types))
        .route(
            "/maintenance/alternate-formats",
            post(maintenance::run_alternate_formats),
        )
        .with_state(state);

    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
