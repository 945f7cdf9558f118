//! Core import task data types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an import task.
///
/// `Completed` and `Failed` are terminal; only `Queued` and `InProgress`
/// tasks are eligible for re-submission by the restarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(TaskStatus::Queued),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// The kind of media a unit carries.
///
/// `Scorecard` is part of the domain but is rejected by the import
/// pipeline; scorecards go through a separate direct-upload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    LivePhoto,
    Scorecard,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::LivePhoto => "live_photo",
            MediaKind::Scorecard => "scorecard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            "live_photo" => Some(MediaKind::LivePhoto),
            "scorecard" => Some(MediaKind::Scorecard),
            _ => None,
        }
    }
}

/// A local source file staged for import: scratch path plus the name the
/// file was uploaded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileRef {
    pub path: PathBuf,
    pub original_name: String,
}

/// One logical media item awaiting conversion within a task.
///
/// A `Photo` unit has exactly `photo` populated, a `Video` unit exactly
/// `video`, and a `LivePhoto` unit both.
#[derive(Debug, Clone)]
pub struct MediaUnit {
    pub id: Uuid,
    pub task_id: Uuid,
    /// Processing order within the task.
    pub position: u32,
    /// Uploaded filename without extension; dedup key within an upload.
    pub base_name: String,
    pub kind: MediaKind,
    pub photo: Option<SourceFileRef>,
    pub video: Option<SourceFileRef>,
    pub processed: bool,
    pub files_purged: bool,
}

impl MediaUnit {
    /// The uploaded filename the resulting asset will be identified by.
    ///
    /// Videos are identified by their video filename; photos and live
    /// photos by the photo filename (matching the asset the processor
    /// materializes).
    pub fn original_file_name(&self) -> Option<&str> {
        match self.kind {
            MediaKind::Video => self.video.as_ref().map(|r| r.original_name.as_str()),
            _ => self.photo.as_ref().map(|r| r.original_name.as_str()),
        }
    }

    /// Both source refs, in photo-then-video order, skipping absent ones.
    pub fn source_refs(&self) -> impl Iterator<Item = &SourceFileRef> {
        self.photo.iter().chain(self.video.iter())
    }
}

/// A durable unit-of-work record tracking one batch of media to import.
#[derive(Debug, Clone)]
pub struct ImportTask {
    pub id: Uuid,
    pub status: TaskStatus,
    /// Owning game, used only for scoping and asset attachment.
    pub game_id: Option<i64>,
    /// Number of times the worker has picked this task up.
    pub attempts: u32,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub units: Vec<MediaUnit>,
}

impl ImportTask {
    /// Fraction of units processed, 0 for an empty task.
    pub fn progress(&self) -> f64 {
        if self.units.is_empty() {
            return 0.0;
        }
        let processed = self.units.iter().filter(|u| u.processed).count();
        processed as f64 / self.units.len() as f64
    }

    /// Human-readable status line derived from unit counts.
    pub fn status_message(&self) -> String {
        let photos = self.count_kind(MediaKind::Photo);
        let videos = self.count_kind(MediaKind::Video);
        let live_photos = self.count_kind(MediaKind::LivePhoto);
        match self.status {
            TaskStatus::Completed => format!(
                "Imported {}, {}, and {}",
                pluralize(photos, "photo"),
                pluralize(videos, "video"),
                pluralize(live_photos, "live photo"),
            ),
            TaskStatus::Failed => "Import failed".to_string(),
            _ => format!(
                "Importing {}, {}, and {}",
                pluralize(photos, "photo"),
                pluralize(videos, "video"),
                pluralize(live_photos, "live photo"),
            ),
        }
    }

    pub fn summary(&self) -> ImportTaskSummary {
        ImportTaskSummary {
            id: self.id,
            status: self.status,
            progress: self.progress(),
            message: self.status_message(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    fn count_kind(&self, kind: MediaKind) -> usize {
        self.units.iter().filter(|u| u.kind == kind).count()
    }
}

fn pluralize(count: usize, singular: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}s", count, singular)
    }
}

/// Pollable projection of a task: status plus derived progress/message.
#[derive(Debug, Clone, Serialize)]
pub struct ImportTaskSummary {
    pub id: Uuid,
    pub status: TaskStatus,
    pub progress: f64,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Role of one physical file variant within an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    Original,
    AlternateFormat,
    Thumbnail,
}

impl FilePurpose {
    /// Base filename used in the remote key for this purpose.
    pub fn base_file_name(&self) -> &'static str {
        match self {
            FilePurpose::Original => "original",
            FilePurpose::AlternateFormat => "alt",
            FilePurpose::Thumbnail => "thumbnail",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilePurpose::Original => "original",
            FilePurpose::AlternateFormat => "alternate_format",
            FilePurpose::Thumbnail => "thumbnail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "original" => Some(FilePurpose::Original),
            "alternate_format" => Some(FilePurpose::AlternateFormat),
            "thumbnail" => Some(FilePurpose::Thumbnail),
            _ => None,
        }
    }
}

/// Thumbnail size variants, bounded by the longest edge in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailSize {
    Small,
    Medium,
    Large,
}

impl ThumbnailSize {
    pub const ALL: [ThumbnailSize; 3] = [
        ThumbnailSize::Small,
        ThumbnailSize::Medium,
        ThumbnailSize::Large,
    ];

    pub fn max_pixels(&self) -> u32 {
        match self {
            ThumbnailSize::Small => 120,
            ThumbnailSize::Medium => 400,
            ThumbnailSize::Large => 1600,
        }
    }

    /// Key segment distinguishing this variant.
    pub fn modifier(&self) -> &'static str {
        match self {
            ThumbnailSize::Small => "small",
            ThumbnailSize::Medium => "medium",
            ThumbnailSize::Large => "large",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "small" => Some(ThumbnailSize::Small),
            "medium" => Some(ThumbnailSize::Medium),
            "large" => Some(ThumbnailSize::Large),
            _ => None,
        }
    }
}

/// One stored file variant belonging to a media asset.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: i64,
    pub purpose: FilePurpose,
    /// Only meaningful for thumbnails.
    pub size_variant: Option<ThumbnailSize>,
    /// With leading dot, e.g. ".jpg".
    pub extension: String,
    /// Unset until resolved against the remote store's metadata.
    pub content_type: Option<String>,
}

/// The durable, published result of successfully processing a media unit.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub id: i64,
    /// Globally unique handle, assigned once on first materialization.
    pub asset_id: Uuid,
    pub game_id: Option<i64>,
    pub kind: MediaKind,
    pub original_file_name: String,
    pub capture_time: DateTime<Utc>,
    pub files: Vec<StoredFile>,
}

impl MediaAsset {
    pub fn remote_ref(&self, file: &StoredFile) -> RemoteFileRef {
        RemoteFileRef {
            asset_id: self.asset_id,
            purpose: file.purpose,
            size_variant: file.size_variant,
            extension: file.extension.clone(),
        }
    }
}

/// Remote addressing for one stored file variant.
///
/// The remote key is a deterministic function of the asset id, purpose,
/// size variant, and extension, so files never need their keys persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileRef {
    pub asset_id: Uuid,
    pub purpose: FilePurpose,
    pub size_variant: Option<ThumbnailSize>,
    pub extension: String,
}

impl RemoteFileRef {
    pub fn key(&self) -> String {
        let modifier = self.size_variant.map(|s| s.modifier()).unwrap_or("");
        format!(
            "{}/{}{}{}",
            self.asset_id,
            self.purpose.base_file_name(),
            modifier,
            self.extension
        )
    }
}

/// A unit as produced by intake, before it has a task or identity.
#[derive(Debug, Clone)]
pub struct NewMediaUnit {
    pub base_name: String,
    pub kind: MediaKind,
    pub photo: Option<SourceFileRef>,
    pub video: Option<SourceFileRef>,
}

/// A stored file pending insertion.
#[derive(Debug, Clone)]
pub struct NewStoredFile {
    pub purpose: FilePurpose,
    pub size_variant: Option<ThumbnailSize>,
    pub extension: String,
    pub content_type: Option<String>,
}

/// An asset pending insertion, as built by the unit processor.
#[derive(Debug, Clone)]
pub struct NewMediaAsset {
    pub asset_id: Uuid,
    pub game_id: Option<i64>,
    pub kind: MediaKind,
    pub original_file_name: String,
    pub capture_time: DateTime<Utc>,
    pub files: Vec<NewStoredFile>,
}

/// Lowercased extension of a filename, with leading dot.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(kind: MediaKind, processed: bool) -> MediaUnit {
        MediaUnit {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            position: 0,
            base_name: "IMG_0001".to_string(),
            kind,
            photo: Some(SourceFileRef {
                path: PathBuf::from("/tmp/IMG_0001.heic"),
                original_name: "IMG_0001.heic".to_string(),
            }),
            video: None,
            processed,
            files_purged: false,
        }
    }

    fn task_with_units(status: TaskStatus, units: Vec<MediaUnit>) -> ImportTask {
        ImportTask {
            id: Uuid::new_v4(),
            status,
            game_id: None,
            attempts: 0,
            failure_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            units,
        }
    }

    #[test]
    fn progress_is_zero_for_empty_task() {
        let task = task_with_units(TaskStatus::Queued, vec![]);
        assert_eq!(task.progress(), 0.0);
    }

    #[test]
    fn progress_counts_processed_units() {
        let task = task_with_units(
            TaskStatus::InProgress,
            vec![
                unit(MediaKind::Photo, true),
                unit(MediaKind::Photo, false),
                unit(MediaKind::Photo, false),
            ],
        );
        assert!((task.progress() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn status_message_pluralizes() {
        let task = task_with_units(
            TaskStatus::InProgress,
            vec![
                unit(MediaKind::Photo, false),
                unit(MediaKind::Photo, false),
                unit(MediaKind::Video, false),
                unit(MediaKind::LivePhoto, false),
            ],
        );
        assert_eq!(
            task.status_message(),
            "Importing 2 photos, 1 video, and 1 live photo"
        );
    }

    #[test]
    fn status_message_for_completed_and_failed() {
        let mut task = task_with_units(TaskStatus::Completed, vec![unit(MediaKind::Photo, true)]);
        assert_eq!(
            task.status_message(),
            "Imported 1 photo, 0 videos, and 0 live photos"
        );
        task.status = TaskStatus::Failed;
        assert_eq!(task.status_message(), "Import failed");
    }

    #[test]
    fn remote_key_derivation() {
        let asset_id = Uuid::parse_str("0a0b0c0d-0000-0000-0000-000000000001").unwrap();
        let original = RemoteFileRef {
            asset_id,
            purpose: FilePurpose::Original,
            size_variant: None,
            extension: ".heic".to_string(),
        };
        assert_eq!(original.key(), format!("{}/original.heic", asset_id));

        let thumb = RemoteFileRef {
            asset_id,
            purpose: FilePurpose::Thumbnail,
            size_variant: Some(ThumbnailSize::Small),
            extension: ".jpg".to_string(),
        };
        assert_eq!(thumb.key(), format!("{}/thumbnailsmall.jpg", asset_id));

        let alt = RemoteFileRef {
            asset_id,
            purpose: FilePurpose::AlternateFormat,
            size_variant: None,
            extension: ".jpg".to_string(),
        };
        assert_eq!(alt.key(), format!("{}/alt.jpg", asset_id));
    }

    #[test]
    fn original_file_name_follows_kind() {
        let mut u = unit(MediaKind::Photo, false);
        u.video = Some(SourceFileRef {
            path: PathBuf::from("/tmp/IMG_0001.mov"),
            original_name: "IMG_0001.mov".to_string(),
        });
        assert_eq!(u.original_file_name(), Some("IMG_0001.heic"));
        u.kind = MediaKind::Video;
        assert_eq!(u.original_file_name(), Some("IMG_0001.mov"));
        u.kind = MediaKind::LivePhoto;
        assert_eq!(u.original_file_name(), Some("IMG_0001.heic"));
    }

    #[test]
    fn file_extension_normalizes() {
        assert_eq!(file_extension("IMG_0001.HEIC"), ".heic");
        assert_eq!(file_extension("clip.MOV"), ".mov");
        assert_eq!(file_extension("noextension"), "");
    }
}
