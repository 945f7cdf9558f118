//! Trait definitions for the converter module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::task::ThumbnailSize;

use super::error::ConverterError;
use super::types::{ImageInfo, VideoInfo};

/// A converter that can probe and transcode photo and video files.
///
/// Conversion outputs are written as new files in the converter's scratch
/// directory; callers own cleanup of both inputs and outputs.
#[async_trait]
pub trait MediaConverter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Probes an image file for its dimensions and normalized extension.
    async fn probe_image(&self, path: &Path) -> Result<ImageInfo, ConverterError>;

    /// Probes a video file for its stream layout and codecs.
    async fn probe_video(&self, path: &Path) -> Result<VideoInfo, ConverterError>;

    /// Extracts the capture timestamp from a photo's or video's metadata.
    async fn extract_capture_time(&self, path: &Path) -> Result<DateTime<Utc>, ConverterError>;

    /// Re-encodes an image as JPEG. With a size, the output is a thumbnail
    /// bounded by that variant's longest edge; without, a full-size JPEG.
    async fn create_jpeg(
        &self,
        path: &Path,
        size: Option<ThumbnailSize>,
    ) -> Result<PathBuf, ConverterError>;

    /// Transcodes a video to H.264 in an MP4 container.
    async fn convert_video_to_h264(&self, path: &Path) -> Result<PathBuf, ConverterError>;

    /// Extracts a representative frame from a video as a JPEG.
    async fn extract_frame(&self, path: &Path) -> Result<PathBuf, ConverterError>;

    /// Validates that the converter's tools are available.
    async fn validate(&self) -> Result<(), ConverterError>;
}
