//! Format maintenance sweepers.
//!
//! Two independently timed jobs: content-type correction reconciles
//! recorded content types against the remote store and fixes a known-bad
//! extension/content-type signature; alternate-format backfill creates
//! web-safe variants for assets that predate conversion or lost theirs.
//! The backfill skips its iteration while an import is in progress.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::converter::{ConverterError, MediaConverter};
use crate::metrics;
use crate::queue::ImportQueue;
use crate::remote::{RemoteStore, RemoteStoreError};
use crate::task::{
    FilePurpose, MediaAsset, MediaKind, MediaStore, NewStoredFile, RemoteFileRef, StoreError,
    StoredFile,
};

use super::config::MaintenanceConfig;

/// Content type signature the store is known to mishandle. Firefox
/// refuses to play QuickTime files served with this fake type.
const BAD_SIGNATURE: (&str, &str) = (".mov", "binary/octet-stream");

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteStoreError),

    #[error(transparent)]
    Converter(#[from] ConverterError),
}

/// Outcome of one content-type correction pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentTypeReport {
    /// Files whose missing content type was filled in.
    pub set_count: usize,
    /// Files whose bad content type was corrected remotely.
    pub updated_count: usize,
    pub errors: Vec<String>,
}

/// Outcome of one alternate-format backfill pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlternateFormatReport {
    /// Assets handled this pass.
    pub processed: usize,
    /// Whether the pass was skipped because an import was in progress.
    pub skipped: bool,
    pub errors: Vec<String>,
}

/// Object-safe surface for running maintenance passes on demand.
#[async_trait]
pub trait FormatMaintenanceOps: Send + Sync {
    async fn run_content_type_pass(&self) -> ContentTypeReport;
    async fn run_alternate_format_pass(&self) -> AlternateFormatReport;
}

/// The format maintenance component; owns both sweep loops.
pub struct FormatMaintenance<C, R>
where
    C: MediaConverter + 'static,
    R: RemoteStore + 'static,
{
    inner: Arc<Sweeper<C, R>>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

/// The sweep logic, shared between the loops and on-demand calls.
struct Sweeper<C, R>
where
    C: MediaConverter + 'static,
    R: RemoteStore + 'static,
{
    config: MaintenanceConfig,
    store: Arc<dyn MediaStore>,
    remote: Arc<R>,
    converter: Arc<C>,
    queue: Arc<ImportQueue>,
}

impl<C, R> FormatMaintenance<C, R>
where
    C: MediaConverter + 'static,
    R: RemoteStore + 'static,
{
    pub fn new(
        config: MaintenanceConfig,
        store: Arc<dyn MediaStore>,
        remote: Arc<R>,
        converter: Arc<C>,
        queue: Arc<ImportQueue>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(2);
        Self {
            inner: Arc::new(Sweeper {
                config,
                store,
                remote,
                converter,
                queue,
            }),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Spawn both sweep loops.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Format maintenance already running");
            return;
        }
        info!("Format maintenance started");
        self.spawn_content_type_loop();
        self.spawn_alternate_format_loop();
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Run the content-type pass once, immediately.
    pub async fn set_content_types(&self) -> ContentTypeReport {
        self.inner.set_content_types().await
    }

    /// Run the alternate-format pass once, immediately.
    pub async fn create_alternate_formats(&self) -> AlternateFormatReport {
        self.inner.create_alternate_formats().await
    }

    fn spawn_content_type_loop(&self) {
        let sweeper = Arc::clone(&self.inner);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_secs(self.inner.config.content_type_interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                let report = sweeper.set_content_types().await;
                if !report.errors.is_empty() {
                    error!(
                        "Content type sweep finished with {} errors",
                        report.errors.len()
                    );
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                }
            }
            info!("Content type sweep loop stopped");
        });
    }

    fn spawn_alternate_format_loop(&self) {
        let sweeper = Arc::clone(&self.inner);
        let running = Arc::clone(&self.running);
        let initial_delay =
            Duration::from_secs(self.inner.config.alternate_format_initial_delay_secs);
        let interval = Duration::from_secs(self.inner.config.alternate_format_interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => return,
                _ = tokio::time::sleep(initial_delay) => {}
            }
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                let report = sweeper.create_alternate_formats().await;
                if !report.errors.is_empty() {
                    error!(
                        "Alternate format sweep finished with {} errors",
                        report.errors.len()
                    );
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Alternate format sweep loop stopped");
        });
    }
}

#[async_trait]
impl<C, R> FormatMaintenanceOps for FormatMaintenance<C, R>
where
    C: MediaConverter + 'static,
    R: RemoteStore + 'static,
{
    async fn run_content_type_pass(&self) -> ContentTypeReport {
        self.set_content_types().await
    }

    async fn run_alternate_format_pass(&self) -> AlternateFormatReport {
        self.create_alternate_formats().await
    }
}

impl<C, R> Sweeper<C, R>
where
    C: MediaConverter + 'static,
    R: RemoteStore + 'static,
{
    /// Fill in missing content types from remote metadata, then correct
    /// files carrying the known-bad signature. Per-file errors are
    /// collected so one bad record never halts the sweep.
    async fn set_content_types(&self) -> ContentTypeReport {
        let mut report = ContentTypeReport::default();

        let missing = match self.store.list_files_missing_content_type() {
            Ok(files) => files,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };
        info!("Found {} stored files missing content types", missing.len());

        for file in missing {
            let result = async {
                let metadata = self.remote.get_metadata(&file.remote_ref()).await?;
                if let Some(content_type) = metadata.content_type {
                    self.store.set_content_type(file.file_id, &content_type)?;
                    return Ok::<bool, MaintenanceError>(true);
                }
                Ok(false)
            }
            .await;

            match result {
                Ok(true) => report.set_count += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        "Failed to set content type for file {}: {}",
                        file.file_id, e
                    );
                    report.errors.push(e.to_string());
                }
            }
        }

        let (bad_extension, bad_content_type) = BAD_SIGNATURE;
        let bad = match self
            .store
            .list_files_with_content_type(bad_extension, bad_content_type)
        {
            Ok(files) => files,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };
        info!(
            "Found {} stored files with incorrect content types",
            bad.len()
        );

        for file in bad {
            let result = async {
                let remote_ref = file.remote_ref();
                let corrected = content_type_for_extension(&file.extension);
                self.remote
                    .update_content_type(&remote_ref, corrected)
                    .await?;
                // Re-fetch so the database records what the store actually
                // serves, not what we asked for.
                let confirmed = self.remote.get_metadata(&remote_ref).await?;
                let content_type = confirmed.content_type.as_deref().unwrap_or(corrected);
                self.store.set_content_type(file.file_id, content_type)?;
                info!(
                    "Updated content type for file {} to {}",
                    file.file_id, content_type
                );
                Ok::<(), MaintenanceError>(())
            }
            .await;

            match result {
                Ok(()) => report.updated_count += 1,
                Err(e) => {
                    warn!(
                        "Failed to update content type for file {}: {}",
                        file.file_id, e
                    );
                    report.errors.push(e.to_string());
                }
            }
        }

        metrics::SWEEP_RUNS
            .with_label_values(&["content_type", "ok"])
            .inc();
        report
    }

    /// Backfill web-safe alternates for a bounded batch of assets. No-ops
    /// while an import is in progress to avoid contending with it.
    async fn create_alternate_formats(&self) -> AlternateFormatReport {
        let mut report = AlternateFormatReport::default();

        if self.queue.import_in_progress() {
            info!("Skipping alternate format creation, import is in progress");
            report.skipped = true;
            metrics::SWEEP_RUNS
                .with_label_values(&["alternate_format", "skipped"])
                .inc();
            return report;
        }

        let assets = match self
            .store
            .list_assets_needing_alternates(self.config.alternate_format_batch_size)
        {
            Ok(assets) => assets,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };
        info!("Creating alternate formats for {} assets", assets.len());

        for asset in assets {
            let result = match asset.kind {
                MediaKind::Photo => self.create_alternate_photo(&asset).await,
                MediaKind::Video => self.create_alternate_video(&asset).await,
                MediaKind::LivePhoto => match self.create_alternate_photo(&asset).await {
                    Ok(()) => self.create_alternate_video(&asset).await,
                    Err(e) => Err(e),
                },
                MediaKind::Scorecard => {
                    warn!(
                        "Unsupported asset kind {} for alternate formats",
                        asset.kind.as_str()
                    );
                    Ok(())
                }
            };

            match result {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    warn!(
                        "Failed to create alternate formats for asset {}: {}",
                        asset.asset_id, e
                    );
                    report.errors.push(e.to_string());
                }
            }
        }

        metrics::SWEEP_RUNS
            .with_label_values(&["alternate_format", "ok"])
            .inc();
        report
    }

    async fn create_alternate_photo(&self, asset: &MediaAsset) -> Result<(), MaintenanceError> {
        let Some(original) = find_file(asset, FilePurpose::Original, "image/") else {
            warn!("No original photo file found for asset {}", asset.asset_id);
            return Ok(());
        };
        if find_file(asset, FilePurpose::AlternateFormat, "image/").is_some() {
            info!(
                "Alternate photo already exists for asset {}",
                asset.asset_id
            );
            return Ok(());
        }

        let downloaded = self.remote.download(&asset.remote_ref(original)).await?;

        let result = async {
            let jpeg = self.converter.create_jpeg(&downloaded, None).await?;
            let upload_result = self.publish_alternate(asset, &jpeg, ".jpg").await;
            remove_temp_file(&jpeg);
            upload_result
        }
        .await;

        remove_temp_file(&downloaded);
        result
    }

    async fn create_alternate_video(&self, asset: &MediaAsset) -> Result<(), MaintenanceError> {
        let original = asset.files.iter().find(|f| {
            f.purpose == FilePurpose::Original
                && f.content_type
                    .as_deref()
                    .map(|ct| ct.starts_with("video/") || ct == "application/octet-stream")
                    .unwrap_or(false)
        });
        let Some(original) = original else {
            warn!("No original video file found for asset {}", asset.asset_id);
            return Ok(());
        };
        if find_file(asset, FilePurpose::AlternateFormat, "video/").is_some() {
            info!(
                "Alternate video already exists for asset {}",
                asset.asset_id
            );
            return Ok(());
        }

        let downloaded = self.remote.download(&asset.remote_ref(original)).await?;

        let result = async {
            let info = self.converter.probe_video(&downloaded).await?;
            if info.is_web_safe() {
                // Already playable; nothing to backfill.
                return Ok(());
            }
            let converted = self.converter.convert_video_to_h264(&downloaded).await?;
            let upload_result = self.publish_alternate(asset, &converted, ".mp4").await;
            remove_temp_file(&converted);
            upload_result
        }
        .await;

        remove_temp_file(&downloaded);
        result
    }

    /// Upload an alternate, resolve its content type, and persist it.
    async fn publish_alternate(
        &self,
        asset: &MediaAsset,
        local_path: &Path,
        extension: &str,
    ) -> Result<(), MaintenanceError> {
        let remote_ref = RemoteFileRef {
            asset_id: asset.asset_id,
            purpose: FilePurpose::AlternateFormat,
            size_variant: None,
            extension: extension.to_string(),
        };
        self.remote.upload(&remote_ref, local_path).await?;
        let metadata = self.remote.get_metadata(&remote_ref).await?;
        self.store.add_stored_file(
            asset.asset_id,
            NewStoredFile {
                purpose: FilePurpose::AlternateFormat,
                size_variant: None,
                extension: extension.to_string(),
                content_type: metadata.content_type.clone(),
            },
        )?;
        info!(
            "Created alternate format for asset {} with content type {:?}",
            asset.asset_id, metadata.content_type
        );
        Ok(())
    }
}

fn find_file<'a>(
    asset: &'a MediaAsset,
    purpose: FilePurpose,
    content_type_prefix: &str,
) -> Option<&'a StoredFile> {
    asset.files.iter().find(|f| {
        f.purpose == purpose
            && f.content_type
                .as_deref()
                .map(|ct| ct.starts_with(content_type_prefix))
                .unwrap_or(false)
    })
}

fn remove_temp_file(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove temp file {}: {}", path.display(), e);
        }
    }
}

/// The content type implied by a file extension.
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".heic" => "image/heic",
        ".png" => "image/png",
        ".mp4" => "video/mp4",
        ".mov" => "video/quicktime",
        ".pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_from_extensions() {
        assert_eq!(content_type_for_extension(".mov"), "video/quicktime");
        assert_eq!(content_type_for_extension(".MOV"), "video/quicktime");
        assert_eq!(content_type_for_extension(".jpg"), "image/jpeg");
        assert_eq!(content_type_for_extension(".heic"), "image/heic");
        assert_eq!(
            content_type_for_extension(".xyz"),
            "application/octet-stream"
        );
    }
}
