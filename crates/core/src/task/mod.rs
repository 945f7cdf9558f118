//! Import task data model and durable storage.
//!
//! Tasks own ordered media units; processing a unit materializes a media
//! asset with its stored file variants. The sqlite store is the durable
//! source of truth the restarter recovers from after a process restart.

mod intake;
mod sqlite_store;
mod store;
mod types;

pub use intake::{group_uploads, IncomingFile, IntakeError};
pub use sqlite_store::SqliteMediaStore;
pub use store::{CreateTaskRequest, MediaStore, StoreError, StoredFileDetail, TaskFilter};
pub use types::{
    file_extension, FilePurpose, ImportTask, ImportTaskSummary, MediaAsset, MediaKind, MediaUnit,
    NewMediaAsset, NewMediaUnit, NewStoredFile, RemoteFileRef, SourceFileRef, StoredFile,
    TaskStatus, ThumbnailSize,
};
