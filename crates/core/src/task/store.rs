//! Media store trait and supporting types.

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::types::{
    FilePurpose, ImportTask, MediaAsset, MediaUnit, NewMediaAsset, NewMediaUnit, NewStoredFile,
    RemoteFileRef, StoredFile, TaskStatus, ThumbnailSize,
};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("import task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("media unit not found: {0}")]
    UnitNotFound(Uuid),

    #[error("media asset not found: {0}")]
    AssetNotFound(Uuid),

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Request to create a new import task with its units.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    /// Owning game, if any.
    pub game_id: Option<i64>,
    /// Units in processing order.
    pub units: Vec<NewMediaUnit>,
}

/// Filter for querying import tasks.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub game_id: Option<i64>,
    /// Whether terminal tasks are included.
    pub include_completed: bool,
    pub limit: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFilter {
    pub fn new() -> Self {
        Self {
            game_id: None,
            include_completed: false,
            limit: 100,
        }
    }

    pub fn with_game(mut self, game_id: i64) -> Self {
        self.game_id = Some(game_id);
        self
    }

    pub fn with_completed(mut self) -> Self {
        self.include_completed = true;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// A stored file joined with its asset's remote identity, as returned by
/// the content-type maintenance queries.
#[derive(Debug, Clone)]
pub struct StoredFileDetail {
    pub file_id: i64,
    pub asset_id: Uuid,
    pub purpose: FilePurpose,
    pub size_variant: Option<ThumbnailSize>,
    pub extension: String,
    pub content_type: Option<String>,
}

impl StoredFileDetail {
    pub fn remote_ref(&self) -> RemoteFileRef {
        RemoteFileRef {
            asset_id: self.asset_id,
            purpose: self.purpose,
            size_variant: self.size_variant,
            extension: self.extension.clone(),
        }
    }
}

/// Durable storage for import tasks, media units, assets, and stored files.
pub trait MediaStore: Send + Sync {
    /// Create a task (status `Queued`) with its units, atomically.
    fn create_task(&self, request: CreateTaskRequest) -> Result<ImportTask, StoreError>;

    /// Load a task with its units in processing order.
    fn get_task(&self, id: Uuid) -> Result<Option<ImportTask>, StoreError>;

    /// List tasks matching the filter, newest first.
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<ImportTask>, StoreError>;

    /// Ids of all tasks with status `Queued` or `InProgress`.
    fn list_resumable_task_ids(&self) -> Result<Vec<Uuid>, StoreError>;

    /// Increment the task's attempt counter and return the new count.
    fn record_task_attempt(&self, id: Uuid) -> Result<u32, StoreError>;

    /// Transition the task to `InProgress`, setting `started_at` only if
    /// it has not been set before.
    fn mark_task_in_progress(&self, id: Uuid, started_at: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Transition the task to a terminal status, setting `completed_at`.
    fn complete_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        failure_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn mark_unit_processed(&self, unit_id: Uuid) -> Result<(), StoreError>;

    fn mark_unit_files_purged(&self, unit_id: Uuid) -> Result<(), StoreError>;

    /// Insert an asset with its stored files, atomically.
    fn insert_asset(&self, asset: NewMediaAsset) -> Result<MediaAsset, StoreError>;

    /// Whether an asset already exists for this uploaded filename within
    /// the given game. This is the unit-level idempotency check.
    fn asset_exists(
        &self,
        original_file_name: &str,
        game_id: Option<i64>,
    ) -> Result<bool, StoreError>;

    fn get_asset(&self, asset_id: Uuid) -> Result<Option<MediaAsset>, StoreError>;

    /// Attach an additional stored file to an existing asset.
    fn add_stored_file(
        &self,
        asset_id: Uuid,
        file: NewStoredFile,
    ) -> Result<StoredFile, StoreError>;

    fn set_content_type(&self, file_id: i64, content_type: &str) -> Result<(), StoreError>;

    /// Stored files with no recorded content type.
    fn list_files_missing_content_type(&self) -> Result<Vec<StoredFileDetail>, StoreError>;

    /// Stored files with exactly this extension and recorded content type.
    fn list_files_with_content_type(
        &self,
        extension: &str,
        content_type: &str,
    ) -> Result<Vec<StoredFileDetail>, StoreError>;

    /// Assets holding a file in a problematic format with fewer alternate
    /// formats than originals, bounded by `limit`.
    fn list_assets_needing_alternates(&self, limit: usize)
        -> Result<Vec<MediaAsset>, StoreError>;

    /// Units whose local source files can be deleted: not yet purged, and
    /// either individually processed or owned by a terminal task.
    fn list_purgeable_units(&self) -> Result<Vec<MediaUnit>, StoreError>;

    /// Whether any unit still references this path as a source file.
    fn source_path_in_use(&self, path: &Path) -> Result<bool, StoreError>;
}
