//! Maintenance API handlers: run one sweep pass on demand.

use axum::{extract::State, Json};
use std::sync::Arc;

use dugout_core::{AlternateFormatReport, ContentTypeReport};

use crate::state::AppState;

pub async fn run_content_types(State(state): State<Arc<AppState>>) -> Json<ContentTypeReport> {
    Json(state.maintenance().run_content_type_pass().await)
}

pub async fn run_alternate_formats(
    State(state): State<Arc<AppState>>,
) -> Json<AlternateFormatReport> {
    Json(state.maintenance().run_alternate_format_pass().await)
}
