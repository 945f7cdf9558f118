//! Temp-file collector.
//!
//! Local scratch files live only as long as the import needs them. The
//! known-unit cleanup deletes source files of finished work and records
//! the purge; the orphan sweep catches generated artifacts nothing in the
//! database references anymore. Deletion failures are logged and left for
//! the next sweep.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::metrics;
use crate::task::MediaStore;

use super::config::MaintenanceConfig;

/// Extensions the pipeline generates into the scratch directory.
const ARTIFACT_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "heic", "mp4", "mov"];

/// Outcome of one known-unit cleanup pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Units whose purge flag was set this pass.
    pub units_purged: usize,
    pub files_deleted: usize,
    pub errors: Vec<String>,
}

/// Outcome of one orphan scratch sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrphanSweepReport {
    pub files_deleted: usize,
    /// Files left alone: too young or still referenced.
    pub files_kept: usize,
    pub errors: Vec<String>,
}

/// Periodic cleanup of local scratch files tied to finished imports.
pub struct TempFileCollector {
    inner: Arc<Collector>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

struct Collector {
    config: MaintenanceConfig,
    store: Arc<dyn MediaStore>,
}

impl TempFileCollector {
    pub fn new(config: MaintenanceConfig, store: Arc<dyn MediaStore>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(2);
        Self {
            inner: Arc::new(Collector { config, store }),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Spawn both sweep loops.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Temp file collector already running");
            return;
        }
        info!("Temp file collector started");
        self.spawn_loop(
            Duration::from_secs(self.inner.config.unit_cleanup_interval_secs),
            |collector| {
                let report = collector.clean_known_units();
                if !report.errors.is_empty() {
                    error!("Unit cleanup finished with {} errors", report.errors.len());
                }
            },
        );
        self.spawn_loop(
            Duration::from_secs(self.inner.config.orphan_sweep_interval_secs),
            |collector| {
                let report = collector.sweep_orphans();
                if !report.errors.is_empty() {
                    error!("Orphan sweep finished with {} errors", report.errors.len());
                }
            },
        );
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Run the known-unit cleanup once, immediately.
    pub fn clean_known_units(&self) -> CleanupReport {
        self.inner.clean_known_units()
    }

    /// Run the orphan sweep once, immediately.
    pub fn sweep_orphans(&self) -> OrphanSweepReport {
        self.inner.sweep_orphans()
    }

    fn spawn_loop(&self, interval: Duration, work: impl Fn(&Collector) + Send + 'static) {
        let collector = Arc::clone(&self.inner);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                work(&collector);

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                }
            }
        });
    }
}

impl Collector {
    /// Delete local source files of units whose work is finished, marking
    /// the purge only when every present file went away.
    fn clean_known_units(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let units = match self.store.list_purgeable_units() {
            Ok(units) => units,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };
        info!("Found {} media units to clean up", units.len());

        for unit in units {
            let mut all_deleted = true;
            for source in unit.source_refs() {
                match delete_if_present(&source.path) {
                    DeleteOutcome::Deleted => report.files_deleted += 1,
                    DeleteOutcome::AlreadyGone => {}
                    DeleteOutcome::Failed(e) => {
                        all_deleted = false;
                        report.errors.push(e);
                    }
                }
            }

            // A failed deletion leaves the flag unset so the next sweep
            // retries.
            if all_deleted {
                match self.store.mark_unit_files_purged(unit.id) {
                    Ok(()) => {
                        report.units_purged += 1;
                        info!("Purged source files for unit {}", unit.base_name);
                    }
                    Err(e) => report.errors.push(e.to_string()),
                }
            }
        }

        metrics::TEMP_FILES_DELETED.inc_by(report.files_deleted as u64);
        metrics::SWEEP_RUNS
            .with_label_values(&["unit_cleanup", "ok"])
            .inc();
        report
    }

    /// Delete old generated artifacts from the scratch directory, leaving
    /// anything a media unit still references as a source file.
    fn sweep_orphans(&self) -> OrphanSweepReport {
        let mut report = OrphanSweepReport::default();
        let max_age = Duration::from_secs(self.config.orphan_max_age_secs);

        let entries = match std::fs::read_dir(&self.config.scratch_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.errors.push(e.to_string());
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !has_artifact_extension(&path) {
                continue;
            }

            match self.is_orphan(&path, max_age) {
                Ok(true) => match std::fs::remove_file(&path) {
                    Ok(()) => {
                        info!("Deleted orphaned scratch file {}", path.display());
                        report.files_deleted += 1;
                    }
                    Err(e) => {
                        warn!("Failed to delete {}: {}", path.display(), e);
                        report.errors.push(e.to_string());
                    }
                },
                Ok(false) => report.files_kept += 1,
                Err(e) => report.errors.push(e),
            }
        }

        metrics::TEMP_FILES_DELETED.inc_by(report.files_deleted as u64);
        metrics::SWEEP_RUNS
            .with_label_values(&["orphan_sweep", "ok"])
            .inc();
        report
    }

    fn is_orphan(&self, path: &Path, max_age: Duration) -> Result<bool, String> {
        let age = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| e.to_string())?
            .elapsed()
            .unwrap_or(Duration::ZERO);
        if age < max_age {
            return Ok(false);
        }

        // Referenced files are never deleted here, regardless of age; the
        // known-unit cleanup owns them.
        let referenced = self
            .store
            .source_path_in_use(path)
            .map_err(|e| e.to_string())?;
        Ok(!referenced)
    }
}

enum DeleteOutcome {
    Deleted,
    AlreadyGone,
    Failed(String),
}

fn delete_if_present(path: &Path) -> DeleteOutcome {
    if !path.exists() {
        warn!("Source file does not exist: {}", path.display());
        return DeleteOutcome::AlreadyGone;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("Deleted source file {}", path.display());
            DeleteOutcome::Deleted
        }
        Err(e) => {
            error!("Failed to delete source file {}: {}", path.display(), e);
            DeleteOutcome::Failed(format!("{}: {}", path.display(), e))
        }
    }
}

fn has_artifact_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let ext = e.to_string_lossy().to_ascii_lowercase();
            ARTIFACT_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
