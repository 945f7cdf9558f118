//! Periodic maintenance: format sweepers and temp-file collection.

mod config;
mod format;
mod temp_files;

pub use config::MaintenanceConfig;
pub use format::{
    content_type_for_extension, AlternateFormatReport, ContentTypeReport, FormatMaintenance,
    FormatMaintenanceOps, MaintenanceError,
};
pub use temp_files::{CleanupReport, OrphanSweepReport, TempFileCollector};
