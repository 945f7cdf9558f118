//! Unit processor: converts one media unit into a media asset.
//!
//! Pure function of a unit (plus its owning game) to a new asset, using
//! the converter and remote store. A live photo runs the photo steps first
//! so the asset's capture time and thumbnails come from the photo, then
//! the video steps with the timestamp extraction skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::converter::{ConverterError, MediaConverter};
use crate::remote::{RemoteStore, RemoteStoreError};
use crate::task::{
    file_extension, FilePurpose, MediaKind, MediaUnit, NewMediaAsset, NewStoredFile,
    RemoteFileRef, SourceFileRef, ThumbnailSize,
};

/// Errors from processing one media unit.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The unit's declared kind requires a source file it does not have.
    #[error("{kind} unit '{base_name}' is missing its {expected} source file")]
    MissingSource {
        kind: &'static str,
        base_name: String,
        expected: &'static str,
    },

    /// Scorecards use a separate direct-upload path.
    #[error("scorecard units are not imported through the media pipeline")]
    UnsupportedKind,

    #[error(transparent)]
    Converter(#[from] ConverterError),

    #[error(transparent)]
    Remote(#[from] RemoteStoreError),
}

impl ProcessError {
    /// Contract violations cannot succeed on retry without operator
    /// correction of the input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ProcessError::MissingSource { .. } | ProcessError::UnsupportedKind
        )
    }
}

/// Asset under construction while a unit's steps run.
struct AssetDraft {
    asset_id: Uuid,
    game_id: Option<i64>,
    kind: MediaKind,
    original_file_name: String,
    capture_time: Option<DateTime<Utc>>,
    files: Vec<NewStoredFile>,
}

impl AssetDraft {
    fn new(kind: MediaKind, game_id: Option<i64>, original_file_name: &str) -> Self {
        Self {
            asset_id: Uuid::new_v4(),
            game_id,
            kind,
            original_file_name: original_file_name.to_string(),
            capture_time: None,
            files: Vec::new(),
        }
    }

    fn remote_ref(
        &self,
        purpose: FilePurpose,
        size_variant: Option<ThumbnailSize>,
        extension: &str,
    ) -> RemoteFileRef {
        RemoteFileRef {
            asset_id: self.asset_id,
            purpose,
            size_variant,
            extension: extension.to_string(),
        }
    }

    fn finish(self) -> Result<NewMediaAsset, ProcessError> {
        // Both photo and video paths set the capture time before any file
        // is uploaded, so this cannot be unset on success.
        let capture_time =
            self.capture_time
                .ok_or_else(|| ConverterError::CaptureTimeMissing {
                    path: PathBuf::from(&self.original_file_name),
                })?;
        Ok(NewMediaAsset {
            asset_id: self.asset_id,
            game_id: self.game_id,
            kind: self.kind,
            original_file_name: self.original_file_name,
            capture_time,
            files: self.files,
        })
    }
}

/// Converts one media unit into its published asset.
pub struct UnitProcessor<C, R>
where
    C: MediaConverter,
    R: RemoteStore,
{
    converter: Arc<C>,
    remote: Arc<R>,
}

impl<C, R> UnitProcessor<C, R>
where
    C: MediaConverter + 'static,
    R: RemoteStore + 'static,
{
    pub fn new(converter: Arc<C>, remote: Arc<R>) -> Self {
        Self { converter, remote }
    }

    /// Process the unit, returning the asset to persist.
    pub async fn process(
        &self,
        unit: &MediaUnit,
        game_id: Option<i64>,
    ) -> Result<NewMediaAsset, ProcessError> {
        match unit.kind {
            MediaKind::Photo => {
                let photo = require_source(unit, "photo", unit.photo.as_ref())?;
                let mut draft = AssetDraft::new(MediaKind::Photo, game_id, &photo.original_name);
                self.photo_steps(&mut draft, photo).await?;
                draft.finish()
            }
            MediaKind::Video => {
                let video = require_source(unit, "video", unit.video.as_ref())?;
                let mut draft = AssetDraft::new(MediaKind::Video, game_id, &video.original_name);
                self.video_steps(&mut draft, video).await?;
                draft.finish()
            }
            MediaKind::LivePhoto => {
                let photo = require_source(unit, "photo", unit.photo.as_ref())?;
                let video = require_source(unit, "video", unit.video.as_ref())?;
                let mut draft =
                    AssetDraft::new(MediaKind::LivePhoto, game_id, &photo.original_name);
                self.photo_steps(&mut draft, photo).await?;
                self.video_steps(&mut draft, video).await?;
                draft.finish()
            }
            MediaKind::Scorecard => Err(ProcessError::UnsupportedKind),
        }
    }

    async fn photo_steps(
        &self,
        draft: &mut AssetDraft,
        source: &SourceFileRef,
    ) -> Result<(), ProcessError> {
        let info = self.converter.probe_image(&source.path).await?;
        let capture_time = self.converter.extract_capture_time(&source.path).await?;
        draft.capture_time = Some(capture_time);

        // Transcode before uploading anything, so a conversion failure
        // leaves no partial remote state.
        let alternate = if info.is_web_safe() {
            None
        } else {
            Some(self.converter.create_jpeg(&source.path, None).await?)
        };

        self.upload_file(
            draft,
            FilePurpose::Original,
            None,
            &file_extension(&source.original_name),
            &source.path,
        )
        .await?;

        if let Some(ref alternate_path) = alternate {
            self.upload_file(draft, FilePurpose::AlternateFormat, None, ".jpg", alternate_path)
                .await?;
        }

        // Thumbnails come from the web-safe representation.
        let thumbnail_source = alternate.as_deref().unwrap_or(&source.path);
        self.generate_thumbnails(draft, thumbnail_source).await?;
        Ok(())
    }

    async fn video_steps(
        &self,
        draft: &mut AssetDraft,
        source: &SourceFileRef,
    ) -> Result<(), ProcessError> {
        if draft.capture_time.is_none() {
            // Not a live photo, so the timestamp comes from the video.
            let capture_time = self.converter.extract_capture_time(&source.path).await?;
            draft.capture_time = Some(capture_time);
        }

        let info = self.converter.probe_video(&source.path).await?;
        let alternate = if info.is_web_safe() {
            None
        } else {
            Some(self.converter.convert_video_to_h264(&source.path).await?)
        };

        self.upload_file(
            draft,
            FilePurpose::Original,
            None,
            &file_extension(&source.original_name),
            &source.path,
        )
        .await?;

        if let Some(ref alternate_path) = alternate {
            self.upload_file(draft, FilePurpose::AlternateFormat, None, ".mp4", alternate_path)
                .await?;
        }

        // A live photo gets its thumbnails from the photo, not the video.
        if draft.kind == MediaKind::Video {
            let frame = self.converter.extract_frame(&source.path).await?;
            self.generate_thumbnails(draft, &frame).await?;
        }
        Ok(())
    }

    /// Upload one file variant and record it on the draft with the
    /// content type the remote store reports for it.
    async fn upload_file(
        &self,
        draft: &mut AssetDraft,
        purpose: FilePurpose,
        size_variant: Option<ThumbnailSize>,
        extension: &str,
        local_path: &Path,
    ) -> Result<(), ProcessError> {
        let remote_ref = draft.remote_ref(purpose, size_variant, extension);
        self.remote.upload(&remote_ref, local_path).await?;
        let metadata = self.remote.get_metadata(&remote_ref).await?;
        draft.files.push(NewStoredFile {
            purpose,
            size_variant,
            extension: extension.to_string(),
            content_type: metadata.content_type,
        });
        Ok(())
    }

    /// Generate and upload the three thumbnail variants. A thumbnail that
    /// fails to generate is omitted; upload failures still propagate.
    async fn generate_thumbnails(
        &self,
        draft: &mut AssetDraft,
        source: &Path,
    ) -> Result<(), ProcessError> {
        for size in ThumbnailSize::ALL {
            match self.converter.create_jpeg(source, Some(size)).await {
                Ok(thumbnail) => {
                    self.upload_file(draft, FilePurpose::Thumbnail, Some(size), ".jpg", &thumbnail)
                        .await?;
                }
                Err(e) => {
                    warn!(
                        "Skipping {} thumbnail for {}: {}",
                        size.modifier(),
                        draft.original_file_name,
                        e
                    );
                }
            }
        }
        info!(
            "Generated thumbnails for {} ({} stored files total)",
            draft.original_file_name,
            draft.files.len()
        );
        Ok(())
    }
}

fn require_source<'a>(
    unit: &MediaUnit,
    expected: &'static str,
    source: Option<&'a SourceFileRef>,
) -> Result<&'a SourceFileRef, ProcessError> {
    source.ok_or(ProcessError::MissingSource {
        kind: unit.kind.as_str(),
        base_name: unit.base_name.clone(),
        expected,
    })
}
