//! Core of the dugout media backend: the asynchronous media-import
//! pipeline and its durable task model.
//!
//! Uploaded photos and videos become [`task::ImportTask`]s whose ids flow
//! through the in-memory [`queue::ImportQueue`] to the single
//! [`worker::ImportWorker`]. The worker drives the
//! [`processor::UnitProcessor`] per unit, persisting progress after each
//! one. The [`worker::TaskRestarter`] recovers abandoned tasks after a
//! process restart, and the [`maintenance`] sweeps keep remote content
//! types, alternate formats, and the local scratch directory healthy.

pub mod config;
pub mod converter;
pub mod maintenance;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod remote;
pub mod task;
pub mod testing;
pub mod worker;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use converter::{ConverterConfig, ConverterError, MediaConverter, ShellConverter};
pub use maintenance::{
    AlternateFormatReport, ContentTypeReport, FormatMaintenance, FormatMaintenanceOps,
    MaintenanceConfig, TempFileCollector,
};
pub use processor::{ProcessError, UnitProcessor};
pub use queue::ImportQueue;
pub use remote::{RemoteStore, RemoteStoreConfig, S3RemoteStore};
pub use task::{
    CreateTaskRequest, ImportTask, ImportTaskSummary, MediaKind, MediaStore, SqliteMediaStore,
    StoreError, TaskFilter, TaskStatus,
};
pub use worker::{ImportWorker, TaskRestarter, WorkerConfig, WorkerError};
