//! Mock converter for testing.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::converter::{ConverterError, ImageInfo, MediaConverter, VideoInfo, VideoStreamInfo};
use crate::task::ThumbnailSize;

/// A recorded converter operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOperation {
    /// Operation name, e.g. "create_jpeg" or "extract_frame".
    pub operation: &'static str,
    pub input: PathBuf,
}

/// Mock implementation of the [`MediaConverter`] trait.
///
/// Provides controllable behavior for testing:
/// - Record every operation for assertions
/// - Configure capture times and video codecs per path
/// - Fail thumbnail generation or everything on demand
///
/// Conversion outputs are small stub files written to the configured
/// output directory, so downstream uploads and cleanups have real paths
/// to work with.
#[derive(Debug, Clone)]
pub struct MockConverter {
    output_dir: PathBuf,
    operations: Arc<RwLock<Vec<RecordedOperation>>>,
    capture_times: Arc<RwLock<HashMap<PathBuf, DateTime<Utc>>>>,
    video_codecs: Arc<RwLock<HashMap<PathBuf, String>>>,
    fail_thumbnails: Arc<RwLock<bool>>,
    fail_capture_time: Arc<RwLock<bool>>,
    next_error: Arc<RwLock<Option<ConverterError>>>,
}

impl MockConverter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            operations: Arc::new(RwLock::new(Vec::new())),
            capture_times: Arc::new(RwLock::new(HashMap::new())),
            video_codecs: Arc::new(RwLock::new(HashMap::new())),
            fail_thumbnails: Arc::new(RwLock::new(false)),
            fail_capture_time: Arc::new(RwLock::new(false)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Default capture time reported when no per-path value is set.
    pub fn default_capture_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 18, 30, 0).unwrap()
    }

    pub async fn recorded_operations(&self) -> Vec<RecordedOperation> {
        self.operations.read().await.clone()
    }

    pub async fn operation_count(&self, operation: &str) -> usize {
        self.operations
            .read()
            .await
            .iter()
            .filter(|op| op.operation == operation)
            .count()
    }

    pub async fn total_operations(&self) -> usize {
        self.operations.read().await.len()
    }

    pub async fn clear_recorded(&self) {
        self.operations.write().await.clear();
    }

    /// Set the capture time reported for a specific path.
    pub async fn set_capture_time(&self, path: impl AsRef<Path>, time: DateTime<Utc>) {
        self.capture_times
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), time);
    }

    /// Set the probed codec for a specific video path.
    pub async fn set_video_codec(&self, path: impl AsRef<Path>, codec: impl Into<String>) {
        self.video_codecs
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), codec.into());
    }

    /// Make all thumbnail-sized create_jpeg calls fail.
    pub async fn set_fail_thumbnails(&self, fail: bool) {
        *self.fail_thumbnails.write().await = fail;
    }

    /// Make every capture-time extraction fail, persistently.
    pub async fn set_fail_capture_time(&self, fail: bool) {
        *self.fail_capture_time.write().await = fail;
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<ConverterError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, operation: &'static str, input: &Path) {
        self.operations.write().await.push(RecordedOperation {
            operation,
            input: input.to_path_buf(),
        });
    }

    async fn write_stub(&self, name: String) -> Result<PathBuf, ConverterError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(name);
        tokio::fs::write(&path, b"mock media output").await?;
        Ok(path)
    }

    fn stem_of(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }

    /// Codec defaults mirror common camera output: QuickTime files carry
    /// HEVC, everything else H.264.
    fn default_codec(path: &Path) -> String {
        let is_mov = path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case("mov"))
            .unwrap_or(false);
        if is_mov { "hevc" } else { "h264" }.to_string()
    }
}

#[async_trait]
impl MediaConverter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe_image(&self, path: &Path) -> Result<ImageInfo, ConverterError> {
        self.record("probe_image", path).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default();
        Ok(ImageInfo {
            extension,
            width: 4032,
            height: 3024,
        })
    }

    async fn probe_video(&self, path: &Path) -> Result<VideoInfo, ConverterError> {
        self.record("probe_video", path).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let codec = self
            .video_codecs
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or_else(|| Self::default_codec(path));
        Ok(VideoInfo {
            streams: vec![VideoStreamInfo {
                codec_name: codec,
                width: Some(1920),
                height: Some(1080),
            }],
        })
    }

    async fn extract_capture_time(&self, path: &Path) -> Result<DateTime<Utc>, ConverterError> {
        self.record("extract_capture_time", path).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if *self.fail_capture_time.read().await {
            return Err(ConverterError::CaptureTimeMissing {
                path: path.to_path_buf(),
            });
        }
        Ok(self
            .capture_times
            .read()
            .await
            .get(path)
            .copied()
            .unwrap_or_else(Self::default_capture_time))
    }

    async fn create_jpeg(
        &self,
        path: &Path,
        size: Option<ThumbnailSize>,
    ) -> Result<PathBuf, ConverterError> {
        self.record("create_jpeg", path).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if size.is_some() && *self.fail_thumbnails.read().await {
            return Err(ConverterError::conversion_failed(
                "thumbnail generation disabled",
                None,
            ));
        }
        let suffix = size.map(|s| format!("-{}", s.modifier())).unwrap_or_default();
        self.write_stub(format!("{}{}.jpg", Self::stem_of(path), suffix))
            .await
    }

    async fn convert_video_to_h264(&self, path: &Path) -> Result<PathBuf, ConverterError> {
        self.record("convert_video_to_h264", path).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.write_stub(format!("{}-h264.mp4", Self::stem_of(path)))
            .await
    }

    async fn extract_frame(&self, path: &Path) -> Result<PathBuf, ConverterError> {
        self.record("extract_frame", path).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.write_stub(format!("{}-frame.jpg", Self::stem_of(path)))
            .await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Ok(())
    }
}
