//! SQLite-backed media store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::store::{CreateTaskRequest, MediaStore, StoreError, StoredFileDetail, TaskFilter};
use super::types::{
    FilePurpose, ImportTask, MediaAsset, MediaKind, MediaUnit, NewMediaAsset, NewStoredFile,
    SourceFileRef, StoredFile, TaskStatus, ThumbnailSize,
};

/// Content types whose assets qualify for alternate-format backfill.
const PROBLEMATIC_CONTENT_TYPES: [&str; 2] = ["video/quicktime", "image/heic"];

/// SQLite-backed media store.
pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
}

impl SqliteMediaStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, useful for testing.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS import_tasks (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                game_id INTEGER,
                attempts INTEGER NOT NULL DEFAULT 0,
                failure_message TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS media_units (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL REFERENCES import_tasks(id),
                position INTEGER NOT NULL,
                base_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                photo_path TEXT,
                photo_name TEXT,
                video_path TEXT,
                video_name TEXT,
                processed INTEGER NOT NULL DEFAULT 0,
                files_purged INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS media_assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                asset_id TEXT NOT NULL UNIQUE,
                game_id INTEGER,
                kind TEXT NOT NULL,
                original_file_name TEXT NOT NULL,
                capture_time TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stored_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                asset_row_id INTEGER NOT NULL REFERENCES media_assets(id),
                purpose TEXT NOT NULL,
                size_variant TEXT,
                extension TEXT NOT NULL,
                content_type TEXT,
                UNIQUE(asset_row_id, purpose, size_variant, extension)
            );

            CREATE INDEX IF NOT EXISTS idx_import_tasks_status ON import_tasks(status);
            CREATE INDEX IF NOT EXISTS idx_media_units_task ON media_units(task_id);
            CREATE INDEX IF NOT EXISTS idx_media_assets_name ON media_assets(original_file_name);
            CREATE INDEX IF NOT EXISTS idx_stored_files_asset ON stored_files(asset_row_id);
            "#,
        )?;
        Ok(())
    }

    fn row_to_unit(row: &rusqlite::Row) -> rusqlite::Result<MediaUnit> {
        let id: String = row.get(0)?;
        let task_id: String = row.get(1)?;
        let position: u32 = row.get(2)?;
        let base_name: String = row.get(3)?;
        let kind: String = row.get(4)?;
        let photo_path: Option<String> = row.get(5)?;
        let photo_name: Option<String> = row.get(6)?;
        let video_path: Option<String> = row.get(7)?;
        let video_name: Option<String> = row.get(8)?;
        let processed: bool = row.get(9)?;
        let files_purged: bool = row.get(10)?;

        Ok(MediaUnit {
            id: parse_uuid(&id),
            task_id: parse_uuid(&task_id),
            position,
            base_name,
            kind: MediaKind::parse(&kind).unwrap_or(MediaKind::Photo),
            photo: source_ref(photo_path, photo_name),
            video: source_ref(video_path, video_name),
            processed,
            files_purged,
        })
    }

    fn load_units(conn: &Connection, task_id: &str) -> Result<Vec<MediaUnit>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT id, task_id, position, base_name, kind, photo_path, photo_name, \
             video_path, video_name, processed, files_purged \
             FROM media_units WHERE task_id = ? ORDER BY position ASC",
        )?;
        let units = stmt
            .query_map(params![task_id], Self::row_to_unit)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(units)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<ImportTask> {
        let id: String = row.get(0)?;
        let status: String = row.get(1)?;
        let game_id: Option<i64> = row.get(2)?;
        let attempts: u32 = row.get(3)?;
        let failure_message: Option<String> = row.get(4)?;
        let created_at: String = row.get(5)?;
        let started_at: Option<String> = row.get(6)?;
        let completed_at: Option<String> = row.get(7)?;

        Ok(ImportTask {
            id: parse_uuid(&id),
            status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Queued),
            game_id,
            attempts,
            failure_message,
            created_at: parse_timestamp(&created_at),
            started_at: started_at.as_deref().map(parse_timestamp),
            completed_at: completed_at.as_deref().map(parse_timestamp),
            units: Vec::new(),
        })
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<StoredFile> {
        let id: i64 = row.get(0)?;
        let purpose: String = row.get(1)?;
        let size_variant: Option<String> = row.get(2)?;
        let extension: String = row.get(3)?;
        let content_type: Option<String> = row.get(4)?;

        Ok(StoredFile {
            id,
            purpose: FilePurpose::parse(&purpose).unwrap_or(FilePurpose::Original),
            size_variant: size_variant.as_deref().and_then(ThumbnailSize::parse),
            extension,
            content_type,
        })
    }

    fn load_asset_files(conn: &Connection, asset_row_id: i64) -> Result<Vec<StoredFile>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT id, purpose, size_variant, extension, content_type \
             FROM stored_files WHERE asset_row_id = ? ORDER BY id ASC",
        )?;
        let files = stmt
            .query_map(params![asset_row_id], Self::row_to_file)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    fn row_to_asset(row: &rusqlite::Row) -> rusqlite::Result<MediaAsset> {
        let id: i64 = row.get(0)?;
        let asset_id: String = row.get(1)?;
        let game_id: Option<i64> = row.get(2)?;
        let kind: String = row.get(3)?;
        let original_file_name: String = row.get(4)?;
        let capture_time: String = row.get(5)?;

        Ok(MediaAsset {
            id,
            asset_id: parse_uuid(&asset_id),
            game_id,
            kind: MediaKind::parse(&kind).unwrap_or(MediaKind::Photo),
            original_file_name,
            capture_time: parse_timestamp(&capture_time),
            files: Vec::new(),
        })
    }

    fn row_to_file_detail(row: &rusqlite::Row) -> rusqlite::Result<StoredFileDetail> {
        let file_id: i64 = row.get(0)?;
        let asset_id: String = row.get(1)?;
        let purpose: String = row.get(2)?;
        let size_variant: Option<String> = row.get(3)?;
        let extension: String = row.get(4)?;
        let content_type: Option<String> = row.get(5)?;

        Ok(StoredFileDetail {
            file_id,
            asset_id: parse_uuid(&asset_id),
            purpose: FilePurpose::parse(&purpose).unwrap_or(FilePurpose::Original),
            size_variant: size_variant.as_deref().and_then(ThumbnailSize::parse),
            extension,
            content_type,
        })
    }
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn source_ref(path: Option<String>, name: Option<String>) -> Option<SourceFileRef> {
    match (path, name) {
        (Some(path), Some(original_name)) => Some(SourceFileRef {
            path: path.into(),
            original_name,
        }),
        _ => None,
    }
}

impl MediaStore for SqliteMediaStore {
    fn create_task(&self, request: CreateTaskRequest) -> Result<ImportTask, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        tx.execute(
            "INSERT INTO import_tasks (id, status, game_id, attempts, created_at) \
             VALUES (?, ?, ?, 0, ?)",
            params![
                id.to_string(),
                TaskStatus::Queued.as_str(),
                request.game_id,
                now.to_rfc3339(),
            ],
        )?;

        let mut units = Vec::with_capacity(request.units.len());
        for (position, new_unit) in request.units.into_iter().enumerate() {
            let unit_id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO media_units (id, task_id, position, base_name, kind, \
                 photo_path, photo_name, video_path, video_name, processed, files_purged) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0)",
                params![
                    unit_id.to_string(),
                    id.to_string(),
                    position as u32,
                    new_unit.base_name,
                    new_unit.kind.as_str(),
                    new_unit.photo.as_ref().map(|r| r.path.to_string_lossy().to_string()),
                    new_unit.photo.as_ref().map(|r| r.original_name.clone()),
                    new_unit.video.as_ref().map(|r| r.path.to_string_lossy().to_string()),
                    new_unit.video.as_ref().map(|r| r.original_name.clone()),
                ],
            )?;
            units.push(MediaUnit {
                id: unit_id,
                task_id: id,
                position: position as u32,
                base_name: new_unit.base_name,
                kind: new_unit.kind,
                photo: new_unit.photo,
                video: new_unit.video,
                processed: false,
                files_purged: false,
            });
        }

        tx.commit()?;

        Ok(ImportTask {
            id,
            status: TaskStatus::Queued,
            game_id: request.game_id,
            attempts: 0,
            failure_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            units,
        })
    }

    fn get_task(&self, id: Uuid) -> Result<Option<ImportTask>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let task = conn
            .query_row(
                "SELECT id, status, game_id, attempts, failure_message, created_at, \
                 started_at, completed_at FROM import_tasks WHERE id = ?",
                params![id.to_string()],
                Self::row_to_task,
            )
            .optional()?;

        match task {
            Some(mut task) => {
                task.units = Self::load_units(&conn, &id.to_string())?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<ImportTask>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut conditions: Vec<&str> = Vec::new();
        let mut bindings: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(game_id) = filter.game_id {
            conditions.push("game_id = ?");
            bindings.push(Box::new(game_id));
        }
        if !filter.include_completed {
            conditions.push("status NOT IN ('completed', 'failed')");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        bindings.push(Box::new(filter.limit));

        let sql = format!(
            "SELECT id, status, game_id, attempts, failure_message, created_at, \
             started_at, completed_at FROM import_tasks {} ORDER BY created_at DESC LIMIT ?",
            where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut tasks = stmt
            .query_map(
                rusqlite::params_from_iter(bindings.iter().map(|b| b.as_ref())),
                Self::row_to_task,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        for task in &mut tasks {
            task.units = Self::load_units(&conn, &task.id.to_string())?;
        }
        Ok(tasks)
    }

    fn list_resumable_task_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM import_tasks WHERE status IN ('queued', 'in_progress') \
             ORDER BY created_at ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.iter().map(|s| parse_uuid(s)).collect())
    }

    fn record_task_attempt(&self, id: Uuid) -> Result<u32, StoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE import_tasks SET attempts = attempts + 1 WHERE id = ?",
            params![id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::TaskNotFound(id));
        }
        let attempts = conn.query_row(
            "SELECT attempts FROM import_tasks WHERE id = ?",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(attempts)
    }

    fn mark_task_in_progress(
        &self,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE import_tasks SET status = 'in_progress', \
             started_at = COALESCE(started_at, ?) WHERE id = ?",
            params![started_at.to_rfc3339(), id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::TaskNotFound(id));
        }
        Ok(())
    }

    fn complete_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        failure_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE import_tasks SET status = ?, failure_message = ?, \
             completed_at = COALESCE(completed_at, ?) WHERE id = ?",
            params![
                status.as_str(),
                failure_message,
                completed_at.to_rfc3339(),
                id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::TaskNotFound(id));
        }
        Ok(())
    }

    fn mark_unit_processed(&self, unit_id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE media_units SET processed = 1 WHERE id = ?",
            params![unit_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::UnitNotFound(unit_id));
        }
        Ok(())
    }

    fn mark_unit_files_purged(&self, unit_id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE media_units SET files_purged = 1 WHERE id = ?",
            params![unit_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::UnitNotFound(unit_id));
        }
        Ok(())
    }

    fn insert_asset(&self, asset: NewMediaAsset) -> Result<MediaAsset, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO media_assets (asset_id, game_id, kind, original_file_name, capture_time) \
             VALUES (?, ?, ?, ?, ?)",
            params![
                asset.asset_id.to_string(),
                asset.game_id,
                asset.kind.as_str(),
                asset.original_file_name,
                asset.capture_time.to_rfc3339(),
            ],
        )?;
        let asset_row_id = tx.last_insert_rowid();

        let mut files = Vec::with_capacity(asset.files.len());
        for file in asset.files {
            tx.execute(
                "INSERT INTO stored_files (asset_row_id, purpose, size_variant, extension, content_type) \
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    asset_row_id,
                    file.purpose.as_str(),
                    file.size_variant.map(|s| s.modifier()),
                    file.extension,
                    file.content_type,
                ],
            )?;
            files.push(StoredFile {
                id: tx.last_insert_rowid(),
                purpose: file.purpose,
                size_variant: file.size_variant,
                extension: file.extension,
                content_type: file.content_type,
            });
        }

        tx.commit()?;

        Ok(MediaAsset {
            id: asset_row_id,
            asset_id: asset.asset_id,
            game_id: asset.game_id,
            kind: asset.kind,
            original_file_name: asset.original_file_name,
            capture_time: asset.capture_time,
            files,
        })
    }

    fn asset_exists(
        &self,
        original_file_name: &str,
        game_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM media_assets WHERE original_file_name = ? AND game_id IS ?",
            params![original_file_name, game_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_asset(&self, asset_id: Uuid) -> Result<Option<MediaAsset>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let asset = conn
            .query_row(
                "SELECT id, asset_id, game_id, kind, original_file_name, capture_time \
                 FROM media_assets WHERE asset_id = ?",
                params![asset_id.to_string()],
                Self::row_to_asset,
            )
            .optional()?;

        match asset {
            Some(mut asset) => {
                asset.files = Self::load_asset_files(&conn, asset.id)?;
                Ok(Some(asset))
            }
            None => Ok(None),
        }
    }

    fn add_stored_file(
        &self,
        asset_id: Uuid,
        file: NewStoredFile,
    ) -> Result<StoredFile, StoreError> {
        let conn = self.conn.lock().unwrap();
        let asset_row_id: i64 = conn
            .query_row(
                "SELECT id FROM media_assets WHERE asset_id = ?",
                params![asset_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::AssetNotFound(asset_id))?;

        conn.execute(
            "INSERT INTO stored_files (asset_row_id, purpose, size_variant, extension, content_type) \
             VALUES (?, ?, ?, ?, ?)",
            params![
                asset_row_id,
                file.purpose.as_str(),
                file.size_variant.map(|s| s.modifier()),
                file.extension,
                file.content_type,
            ],
        )?;

        Ok(StoredFile {
            id: conn.last_insert_rowid(),
            purpose: file.purpose,
            size_variant: file.size_variant,
            extension: file.extension,
            content_type: file.content_type,
        })
    }

    fn set_content_type(&self, file_id: i64, content_type: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE stored_files SET content_type = ? WHERE id = ?",
            params![content_type, file_id],
        )?;
        Ok(())
    }

    fn list_files_missing_content_type(&self) -> Result<Vec<StoredFileDetail>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT f.id, a.asset_id, f.purpose, f.size_variant, f.extension, f.content_type \
             FROM stored_files f JOIN media_assets a ON f.asset_row_id = a.id \
             WHERE f.content_type IS NULL OR f.content_type = '' \
             ORDER BY f.id ASC",
        )?;
        let files = stmt
            .query_map([], Self::row_to_file_detail)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    fn list_files_with_content_type(
        &self,
        extension: &str,
        content_type: &str,
    ) -> Result<Vec<StoredFileDetail>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT f.id, a.asset_id, f.purpose, f.size_variant, f.extension, f.content_type \
             FROM stored_files f JOIN media_assets a ON f.asset_row_id = a.id \
             WHERE f.extension = ? AND f.content_type = ? \
             ORDER BY f.id ASC",
        )?;
        let files = stmt
            .query_map(params![extension, content_type], Self::row_to_file_detail)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    fn list_assets_needing_alternates(
        &self,
        limit: usize,
    ) -> Result<Vec<MediaAsset>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.id, a.asset_id, a.game_id, a.kind, a.original_file_name, a.capture_time \
             FROM media_assets a \
             WHERE EXISTS (SELECT 1 FROM stored_files f WHERE f.asset_row_id = a.id \
                           AND f.content_type IN (?, ?)) \
             AND (SELECT COUNT(*) FROM stored_files f WHERE f.asset_row_id = a.id \
                  AND f.purpose = 'alternate_format') \
               < (SELECT COUNT(*) FROM stored_files f WHERE f.asset_row_id = a.id \
                  AND f.purpose = 'original') \
             ORDER BY a.id ASC LIMIT ?",
        )?;
        let mut assets = stmt
            .query_map(
                params![
                    PROBLEMATIC_CONTENT_TYPES[0],
                    PROBLEMATIC_CONTENT_TYPES[1],
                    limit as i64,
                ],
                Self::row_to_asset,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        for asset in &mut assets {
            asset.files = Self::load_asset_files(&conn, asset.id)?;
        }
        Ok(assets)
    }

    fn list_purgeable_units(&self) -> Result<Vec<MediaUnit>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.task_id, u.position, u.base_name, u.kind, u.photo_path, \
             u.photo_name, u.video_path, u.video_name, u.processed, u.files_purged \
             FROM media_units u JOIN import_tasks t ON u.task_id = t.id \
             WHERE u.files_purged = 0 \
             AND (t.status IN ('completed', 'failed') OR u.processed = 1) \
             ORDER BY u.task_id, u.position",
        )?;
        let units = stmt
            .query_map([], Self::row_to_unit)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(units)
    }

    fn source_path_in_use(&self, path: &Path) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let path_str = path.to_string_lossy().to_string();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM media_units WHERE photo_path = ? OR video_path = ?",
            params![path_str, path_str],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::types::file_extension;
    use crate::task::types::NewMediaUnit;
    use std::path::PathBuf;

    fn store() -> SqliteMediaStore {
        SqliteMediaStore::in_memory().expect("in-memory store")
    }

    fn photo_unit(name: &str) -> NewMediaUnit {
        NewMediaUnit {
            base_name: name.rsplit_once('.').map(|(b, _)| b.to_string()).unwrap(),
            kind: MediaKind::Photo,
            photo: Some(SourceFileRef {
                path: PathBuf::from(format!("/scratch/{}", name)),
                original_name: name.to_string(),
            }),
            video: None,
        }
    }

    fn asset_with_files(name: &str, game_id: Option<i64>, files: Vec<NewStoredFile>) -> NewMediaAsset {
        NewMediaAsset {
            asset_id: Uuid::new_v4(),
            game_id,
            kind: MediaKind::Photo,
            original_file_name: name.to_string(),
            capture_time: Utc::now(),
            files,
        }
    }

    fn original_file(extension: &str, content_type: Option<&str>) -> NewStoredFile {
        NewStoredFile {
            purpose: FilePurpose::Original,
            size_variant: None,
            extension: extension.to_string(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn create_and_load_task_roundtrip() {
        let store = store();
        let task = store
            .create_task(CreateTaskRequest {
                game_id: Some(7),
                units: vec![photo_unit("a.heic"), photo_unit("b.jpg")],
            })
            .unwrap();

        let loaded = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Queued);
        assert_eq!(loaded.game_id, Some(7));
        assert_eq!(loaded.units.len(), 2);
        assert_eq!(loaded.units[0].base_name, "a");
        assert_eq!(loaded.units[1].position, 1);
        assert!(!loaded.units[0].processed);
    }

    #[test]
    fn status_transitions_set_timestamps_once() {
        let store = store();
        let task = store
            .create_task(CreateTaskRequest {
                game_id: None,
                units: vec![photo_unit("a.jpg")],
            })
            .unwrap();

        let first_start = Utc::now();
        store.mark_task_in_progress(task.id, first_start).unwrap();
        let later = first_start + chrono::Duration::hours(1);
        store.mark_task_in_progress(task.id, later).unwrap();

        let loaded = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::InProgress);
        let started = loaded.started_at.unwrap();
        assert!((started - first_start).num_seconds().abs() < 2);

        store
            .complete_task(task.id, TaskStatus::Completed, None, Utc::now())
            .unwrap();
        let loaded = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Completed);
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn resumable_ids_exclude_terminal_tasks() {
        let store = store();
        let queued = store
            .create_task(CreateTaskRequest { game_id: None, units: vec![] })
            .unwrap();
        let in_progress = store
            .create_task(CreateTaskRequest { game_id: None, units: vec![] })
            .unwrap();
        store
            .mark_task_in_progress(in_progress.id, Utc::now())
            .unwrap();
        let done = store
            .create_task(CreateTaskRequest { game_id: None, units: vec![] })
            .unwrap();
        store
            .complete_task(done.id, TaskStatus::Completed, None, Utc::now())
            .unwrap();

        let ids = store.list_resumable_task_ids().unwrap();
        assert!(ids.contains(&queued.id));
        assert!(ids.contains(&in_progress.id));
        assert!(!ids.contains(&done.id));
    }

    #[test]
    fn attempts_increment() {
        let store = store();
        let task = store
            .create_task(CreateTaskRequest { game_id: None, units: vec![] })
            .unwrap();
        assert_eq!(store.record_task_attempt(task.id).unwrap(), 1);
        assert_eq!(store.record_task_attempt(task.id).unwrap(), 2);
    }

    #[test]
    fn asset_existence_is_scoped_to_game() {
        let store = store();
        store
            .insert_asset(asset_with_files("a.heic", Some(1), vec![]))
            .unwrap();

        assert!(store.asset_exists("a.heic", Some(1)).unwrap());
        assert!(!store.asset_exists("a.heic", Some(2)).unwrap());
        assert!(!store.asset_exists("a.heic", None).unwrap());
        assert!(!store.asset_exists("b.heic", Some(1)).unwrap());
    }

    #[test]
    fn content_type_queries() {
        let store = store();
        let asset = store
            .insert_asset(asset_with_files(
                "clip.mov",
                None,
                vec![
                    original_file(".mov", Some("binary/octet-stream")),
                    original_file(".jpg", None),
                ],
            ))
            .unwrap();

        let missing = store.list_files_missing_content_type().unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].extension, ".jpg");
        assert_eq!(missing[0].asset_id, asset.asset_id);

        let bad = store
            .list_files_with_content_type(".mov", "binary/octet-stream")
            .unwrap();
        assert_eq!(bad.len(), 1);

        store
            .set_content_type(bad[0].file_id, "video/quicktime")
            .unwrap();
        let bad = store
            .list_files_with_content_type(".mov", "binary/octet-stream")
            .unwrap();
        assert!(bad.is_empty());
    }

    #[test]
    fn assets_needing_alternates_query() {
        let store = store();
        // HEIC original with no alternate: needs one.
        let needs = store
            .insert_asset(asset_with_files(
                "a.heic",
                None,
                vec![original_file(".heic", Some("image/heic"))],
            ))
            .unwrap();
        // HEIC original with an alternate already: satisfied.
        store
            .insert_asset(asset_with_files(
                "b.heic",
                None,
                vec![
                    original_file(".heic", Some("image/heic")),
                    NewStoredFile {
                        purpose: FilePurpose::AlternateFormat,
                        size_variant: None,
                        extension: ".jpg".to_string(),
                        content_type: Some("image/jpeg".to_string()),
                    },
                ],
            ))
            .unwrap();
        // Plain JPEG: never qualifies.
        store
            .insert_asset(asset_with_files(
                "c.jpg",
                None,
                vec![original_file(".jpg", Some("image/jpeg"))],
            ))
            .unwrap();

        let assets = store.list_assets_needing_alternates(10).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].asset_id, needs.asset_id);
        assert_eq!(assets[0].files.len(), 1);
    }

    #[test]
    fn purgeable_units_and_path_references() {
        let store = store();
        let done = store
            .create_task(CreateTaskRequest {
                game_id: None,
                units: vec![photo_unit("a.jpg")],
            })
            .unwrap();
        store
            .complete_task(done.id, TaskStatus::Completed, None, Utc::now())
            .unwrap();

        let pending = store
            .create_task(CreateTaskRequest {
                game_id: None,
                units: vec![photo_unit("b.jpg")],
            })
            .unwrap();

        let purgeable = store.list_purgeable_units().unwrap();
        assert_eq!(purgeable.len(), 1);
        assert_eq!(purgeable[0].base_name, "a");

        store.mark_unit_files_purged(purgeable[0].id).unwrap();
        assert!(store.list_purgeable_units().unwrap().is_empty());

        assert!(store
            .source_path_in_use(Path::new("/scratch/b.jpg"))
            .unwrap());
        assert!(!store
            .source_path_in_use(Path::new("/scratch/zzz.jpg"))
            .unwrap());
        let _ = pending;
    }

    #[test]
    fn add_stored_file_appends_to_asset() {
        let store = store();
        let asset = store
            .insert_asset(asset_with_files(
                "a.heic",
                None,
                vec![original_file(".heic", Some("image/heic"))],
            ))
            .unwrap();

        store
            .add_stored_file(
                asset.asset_id,
                NewStoredFile {
                    purpose: FilePurpose::AlternateFormat,
                    size_variant: None,
                    extension: file_extension("out.jpg"),
                    content_type: Some("image/jpeg".to_string()),
                },
            )
            .unwrap();

        let loaded = store.get_asset(asset.asset_id).unwrap().unwrap();
        assert_eq!(loaded.files.len(), 2);
        assert!(loaded
            .files
            .iter()
            .any(|f| f.purpose == FilePurpose::AlternateFormat && f.extension == ".jpg"));
    }
}
