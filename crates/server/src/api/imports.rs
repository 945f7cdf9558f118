//! Media import API handlers.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use dugout_core::task::{file_extension, group_uploads, IncomingFile};
use dugout_core::{CreateTaskRequest, ImportTaskSummary, TaskFilter};

use crate::state::AppState;

/// Query parameters for listing import tasks
#[derive(Debug, Deserialize)]
pub struct ListImportsParams {
    /// Restrict to tasks for this game
    pub game_id: Option<i64>,
    /// Include completed and failed tasks
    #[serde(default)]
    pub include_completed: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Accept a multipart upload of media files, stage them in the scratch
/// directory, group them into units, and queue the import task.
pub async fn create_import(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImportTaskSummary>), (StatusCode, Json<ErrorResponse>)> {
    let mut game_id: Option<i64> = None;
    let mut files: Vec<IncomingFile> = Vec::new();

    tokio::fs::create_dir_all(state.scratch_dir())
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("game_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
                let parsed = text.trim().parse::<i64>().map_err(|_| {
                    error_response(StatusCode::BAD_REQUEST, format!("invalid game_id '{}'", text))
                })?;
                game_id = Some(parsed);
            }
            _ => {
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    return Err(error_response(
                        StatusCode::BAD_REQUEST,
                        "file field is missing a filename",
                    ));
                };
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;

                // Stage under a fresh name, preserving the extension for
                // the converters.
                let local_path = state
                    .scratch_dir()
                    .join(format!("{}{}", Uuid::new_v4(), file_extension(&file_name)));
                tokio::fs::write(&local_path, &bytes)
                    .await
                    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

                files.push(IncomingFile {
                    file_name,
                    content_type,
                    local_path,
                });
            }
        }
    }

    if files.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "no files uploaded"));
    }

    let units = group_uploads(files).map_err(|e| {
        warn!("Rejected media upload: {}", e);
        error_response(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let task = state
        .store()
        .create_task(CreateTaskRequest { game_id, units })
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    state.queue().push(task.id);
    info!("Created import task {} with {} units", task.id, task.units.len());

    Ok((StatusCode::CREATED, Json(task.summary())))
}

/// Current status of one import task
pub async fn get_import_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<ImportTaskSummary>, impl IntoResponse> {
    match state.store().get_task(task_id) {
        Ok(Some(task)) => Ok(Json(task.summary())),
        Ok(None) => Err(error_response(StatusCode::NOT_FOUND, "import task not found")),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// List import tasks, by default only pending ones
pub async fn list_imports(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListImportsParams>,
) -> Result<Json<Vec<ImportTaskSummary>>, (StatusCode, Json<ErrorResponse>)> {
    let mut filter = TaskFilter::new();
    if let Some(game_id) = params.game_id {
        filter = filter.with_game(game_id);
    }
    if params.include_completed {
        filter = filter.with_completed();
    }

    let tasks = state
        .store()
        .list_tasks(&filter)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(tasks.iter().map(|t| t.summary()).collect()))
}

/// Re-queue a non-terminal import task. Completed and failed tasks are
/// rejected explicitly; callers must create a new task instead.
pub async fn restart_import(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<ImportTaskSummary>, (StatusCode, Json<ErrorResponse>)> {
    let task = state
        .store()
        .get_task(task_id)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "import task not found"))?;

    if task.status.is_terminal() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Cannot restart a completed or failed import task. Please create a new import task.",
        ));
    }

    state.queue().push(task.id);
    Ok(Json(task.summary()))
}
