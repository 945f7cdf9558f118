//! Maintenance sweep integration tests.
//!
//! Cover the content-type correction pass, the alternate-format backfill
//! (including its import-in-progress guard and temp cleanup), the
//! known-unit source file cleanup, and the orphan scratch sweep.

use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use dugout_core::maintenance::{FormatMaintenance, MaintenanceConfig, TempFileCollector};
use dugout_core::task::{
    CreateTaskRequest, FilePurpose, MediaKind, MediaStore, NewMediaAsset, NewMediaUnit,
    NewStoredFile, SourceFileRef, SqliteMediaStore, TaskStatus,
};
use dugout_core::testing::{MockConverter, MockRemoteStore};
use dugout_core::ImportQueue;

struct SweepHarness {
    store: Arc<SqliteMediaStore>,
    queue: Arc<ImportQueue>,
    remote: Arc<MockRemoteStore>,
    maintenance: FormatMaintenance<MockConverter, MockRemoteStore>,
    scratch: TempDir,
}

impl SweepHarness {
    fn new() -> Self {
        let scratch = TempDir::new().expect("failed to create scratch dir");
        let store = Arc::new(SqliteMediaStore::in_memory().expect("failed to create store"));
        let queue = Arc::new(ImportQueue::new());
        let converter = Arc::new(MockConverter::new(scratch.path().to_path_buf()));
        let remote = Arc::new(MockRemoteStore::new(scratch.path().to_path_buf()));

        let config = MaintenanceConfig {
            scratch_dir: scratch.path().to_path_buf(),
            ..MaintenanceConfig::default()
        };
        let maintenance = FormatMaintenance::new(
            config,
            Arc::clone(&store) as Arc<dyn MediaStore>,
            Arc::clone(&remote),
            Arc::clone(&converter),
            Arc::clone(&queue),
        );

        Self {
            store,
            queue,
            remote,
            maintenance,
            scratch,
        }
    }

    fn insert_asset(&self, name: &str, kind: MediaKind, files: Vec<NewStoredFile>) -> Uuid {
        self.store
            .insert_asset(NewMediaAsset {
                asset_id: Uuid::new_v4(),
                game_id: None,
                kind,
                original_file_name: name.to_string(),
                capture_time: Utc::now(),
                files,
            })
            .expect("failed to insert asset")
            .asset_id
    }
}

fn stored(purpose: FilePurpose, extension: &str, content_type: Option<&str>) -> NewStoredFile {
    NewStoredFile {
        purpose,
        size_variant: None,
        extension: extension.to_string(),
        content_type: content_type.map(str::to_string),
    }
}

#[tokio::test]
async fn content_type_sweep_fills_missing_and_corrects_quicktime() {
    let harness = SweepHarness::new();
    let asset_id = harness.insert_asset(
        "clip.mov",
        MediaKind::Video,
        vec![
            stored(FilePurpose::Original, ".mov", Some("binary/octet-stream")),
            stored(FilePurpose::Thumbnail, ".jpg", None),
        ],
    );

    let asset = harness.store.get_asset(asset_id).unwrap().unwrap();
    let mov_ref = asset.remote_ref(
        asset
            .files
            .iter()
            .find(|f| f.extension == ".mov")
            .unwrap(),
    );
    let jpg_ref = asset.remote_ref(
        asset
            .files
            .iter()
            .find(|f| f.extension == ".jpg")
            .unwrap(),
    );
    // The store serves the QuickTime file with its fake generic type and
    // the thumbnail correctly.
    harness.remote.seed_object(&mov_ref, "binary/octet-stream").await;
    harness.remote.seed_object(&jpg_ref, "image/jpeg").await;

    let report = harness.maintenance.set_content_types().await;
    assert_eq!(report.set_count, 1);
    assert_eq!(report.updated_count, 1);
    assert!(report.errors.is_empty());

    // The correction was pushed to the remote store and re-verified.
    assert_eq!(
        harness.remote.remote_content_type(&mov_ref).await.as_deref(),
        Some("video/quicktime")
    );
    let asset = harness.store.get_asset(asset_id).unwrap().unwrap();
    let mov = asset.files.iter().find(|f| f.extension == ".mov").unwrap();
    assert_eq!(mov.content_type.as_deref(), Some("video/quicktime"));
    let jpg = asset.files.iter().find(|f| f.extension == ".jpg").unwrap();
    assert_eq!(jpg.content_type.as_deref(), Some("image/jpeg"));

    // A second sweep finds nothing left to do.
    let report = harness.maintenance.set_content_types().await;
    assert_eq!(report.set_count, 0);
    assert_eq!(report.updated_count, 0);
}

#[tokio::test]
async fn content_type_sweep_continues_past_missing_remote_objects() {
    let harness = SweepHarness::new();
    harness.insert_asset(
        "gone.jpg",
        MediaKind::Photo,
        vec![stored(FilePurpose::Original, ".jpg", None)],
    );
    let present = harness.insert_asset(
        "here.jpg",
        MediaKind::Photo,
        vec![stored(FilePurpose::Original, ".jpg", None)],
    );
    let asset = harness.store.get_asset(present).unwrap().unwrap();
    harness
        .remote
        .seed_object(&asset.remote_ref(&asset.files[0]), "image/jpeg")
        .await;

    let report = harness.maintenance.set_content_types().await;
    // The missing object is an error, but the present one still got set.
    assert_eq!(report.set_count, 1);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn alternate_sweep_skips_while_import_in_progress() {
    let harness = SweepHarness::new();
    let asset_id = harness.insert_asset(
        "a.heic",
        MediaKind::Photo,
        vec![stored(FilePurpose::Original, ".heic", Some("image/heic"))],
    );
    let asset = harness.store.get_asset(asset_id).unwrap().unwrap();
    harness
        .remote
        .seed_object(&asset.remote_ref(&asset.files[0]), "image/heic")
        .await;

    harness.queue.mark_import_in_progress();
    let report = harness.maintenance.create_alternate_formats().await;

    assert!(report.skipped);
    assert_eq!(report.processed, 0);
    assert_eq!(harness.remote.upload_count().await, 0);

    // Once the import finishes the same sweep does real work.
    harness.queue.mark_import_complete();
    let report = harness.maintenance.create_alternate_formats().await;
    assert!(!report.skipped);
    assert_eq!(report.processed, 1);
}

#[tokio::test]
async fn alternate_sweep_backfills_heic_photo() {
    let harness = SweepHarness::new();
    let asset_id = harness.insert_asset(
        "a.heic",
        MediaKind::Photo,
        vec![stored(FilePurpose::Original, ".heic", Some("image/heic"))],
    );
    let asset = harness.store.get_asset(asset_id).unwrap().unwrap();
    harness
        .remote
        .seed_object(&asset.remote_ref(&asset.files[0]), "image/heic")
        .await;

    let report = harness.maintenance.create_alternate_formats().await;
    assert_eq!(report.processed, 1);
    assert!(report.errors.is_empty());

    let asset = harness.store.get_asset(asset_id).unwrap().unwrap();
    let alternate = asset
        .files
        .iter()
        .find(|f| f.purpose == FilePurpose::AlternateFormat)
        .expect("alternate should have been created");
    assert_eq!(alternate.extension, ".jpg");
    assert_eq!(alternate.content_type.as_deref(), Some("image/jpeg"));

    let keys = harness.remote.uploaded_keys().await;
    assert!(keys.contains(&format!("{}/alt.jpg", asset_id)));

    // Local download and conversion temps were cleaned up.
    let leftovers: Vec<_> = std::fs::read_dir(harness.scratch.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    assert!(leftovers.is_empty(), "leftover temp files: {:?}", leftovers);

    // The asset no longer qualifies for the next sweep.
    let report = harness.maintenance.create_alternate_formats().await;
    assert_eq!(report.processed, 0);
}

#[tokio::test]
async fn alternate_sweep_backfills_quicktime_video() {
    let harness = SweepHarness::new();
    let asset_id = harness.insert_asset(
        "clip.mov",
        MediaKind::Video,
        vec![stored(FilePurpose::Original, ".mov", Some("video/quicktime"))],
    );
    let asset = harness.store.get_asset(asset_id).unwrap().unwrap();
    harness
        .remote
        .seed_object(&asset.remote_ref(&asset.files[0]), "video/quicktime")
        .await;

    let report = harness.maintenance.create_alternate_formats().await;
    assert_eq!(report.processed, 1);
    assert!(report.errors.is_empty());

    let asset = harness.store.get_asset(asset_id).unwrap().unwrap();
    let alternate = asset
        .files
        .iter()
        .find(|f| f.purpose == FilePurpose::AlternateFormat)
        .expect("alternate video should have been created");
    assert_eq!(alternate.extension, ".mp4");
    assert_eq!(alternate.content_type.as_deref(), Some("video/mp4"));
}

#[tokio::test]
async fn unit_cleanup_deletes_sources_and_marks_purge() {
    let scratch = TempDir::new().unwrap();
    let store = Arc::new(SqliteMediaStore::in_memory().unwrap());

    let photo_path = scratch.path().join("a.heic");
    let video_path = scratch.path().join("a.mov");
    std::fs::write(&photo_path, b"photo").unwrap();
    std::fs::write(&video_path, b"video").unwrap();

    let task = store
        .create_task(CreateTaskRequest {
            game_id: None,
            units: vec![NewMediaUnit {
                base_name: "a".to_string(),
                kind: MediaKind::LivePhoto,
                photo: Some(SourceFileRef {
                    path: photo_path.clone(),
                    original_name: "a.heic".to_string(),
                }),
                video: Some(SourceFileRef {
                    path: video_path.clone(),
                    original_name: "a.mov".to_string(),
                }),
            }],
        })
        .unwrap();
    store
        .complete_task(task.id, TaskStatus::Completed, None, Utc::now())
        .unwrap();

    let config = MaintenanceConfig {
        scratch_dir: scratch.path().to_path_buf(),
        ..MaintenanceConfig::default()
    };
    let collector = TempFileCollector::new(config, Arc::clone(&store) as Arc<dyn MediaStore>);

    let report = collector.clean_known_units();
    assert_eq!(report.units_purged, 1);
    assert_eq!(report.files_deleted, 2);
    assert!(!photo_path.exists());
    assert!(!video_path.exists());

    let task = store.get_task(task.id).unwrap().unwrap();
    assert!(task.units[0].files_purged);

    // Nothing left for the next sweep.
    let report = collector.clean_known_units();
    assert_eq!(report.units_purged, 0);
}

#[tokio::test]
async fn unit_cleanup_failure_leaves_purge_flag_unset() {
    let scratch = TempDir::new().unwrap();
    let store = Arc::new(SqliteMediaStore::in_memory().unwrap());

    // A directory at the source path makes the file deletion fail.
    let stubborn_path = scratch.path().join("stuck.jpg");
    std::fs::create_dir(&stubborn_path).unwrap();

    let task = store
        .create_task(CreateTaskRequest {
            game_id: None,
            units: vec![NewMediaUnit {
                base_name: "stuck".to_string(),
                kind: MediaKind::Photo,
                photo: Some(SourceFileRef {
                    path: stubborn_path.clone(),
                    original_name: "stuck.jpg".to_string(),
                }),
                video: None,
            }],
        })
        .unwrap();
    store
        .complete_task(task.id, TaskStatus::Completed, None, Utc::now())
        .unwrap();

    let config = MaintenanceConfig {
        scratch_dir: scratch.path().to_path_buf(),
        ..MaintenanceConfig::default()
    };
    let collector = TempFileCollector::new(config, Arc::clone(&store) as Arc<dyn MediaStore>);

    let report = collector.clean_known_units();
    assert_eq!(report.units_purged, 0);
    assert!(!report.errors.is_empty());
    let task = store.get_task(task.id).unwrap().unwrap();
    assert!(!task.units[0].files_purged);

    // Once the obstruction is gone the retry succeeds.
    std::fs::remove_dir(&stubborn_path).unwrap();
    let report = collector.clean_known_units();
    assert_eq!(report.units_purged, 1);
}

#[tokio::test]
async fn orphan_sweep_spares_referenced_and_young_files() {
    let scratch = TempDir::new().unwrap();
    let store = Arc::new(SqliteMediaStore::in_memory().unwrap());

    let referenced = scratch.path().join("referenced.jpg");
    let orphan = scratch.path().join("orphan.jpg");
    let unrelated = scratch.path().join("notes.txt");
    std::fs::write(&referenced, b"referenced").unwrap();
    std::fs::write(&orphan, b"orphan").unwrap();
    std::fs::write(&unrelated, b"notes").unwrap();

    // An unprocessed unit still points at the referenced file.
    store
        .create_task(CreateTaskRequest {
            game_id: None,
            units: vec![NewMediaUnit {
                base_name: "referenced".to_string(),
                kind: MediaKind::Photo,
                photo: Some(SourceFileRef {
                    path: referenced.clone(),
                    original_name: "referenced.jpg".to_string(),
                }),
                video: None,
            }],
        })
        .unwrap();

    // Zero age threshold: every candidate file is old enough.
    let config = MaintenanceConfig {
        scratch_dir: scratch.path().to_path_buf(),
        orphan_max_age_secs: 0,
        ..MaintenanceConfig::default()
    };
    let collector = TempFileCollector::new(config, Arc::clone(&store) as Arc<dyn MediaStore>);

    let report = collector.sweep_orphans();
    assert_eq!(report.files_deleted, 1);
    assert_eq!(report.files_kept, 1);
    // Referenced files survive regardless of age; non-artifact files are
    // not even considered.
    assert!(referenced.exists());
    assert!(!orphan.exists());
    assert!(unrelated.exists());
}

#[tokio::test]
async fn orphan_sweep_keeps_files_younger_than_threshold() {
    let scratch = TempDir::new().unwrap();
    let store = Arc::new(SqliteMediaStore::in_memory().unwrap());

    let young = scratch.path().join("young.jpg");
    std::fs::write(&young, b"young").unwrap();

    let config = MaintenanceConfig {
        scratch_dir: scratch.path().to_path_buf(),
        orphan_max_age_secs: 24 * 60 * 60,
        ..MaintenanceConfig::default()
    };
    let collector = TempFileCollector::new(config, Arc::clone(&store) as Arc<dyn MediaStore>);

    let report = collector.sweep_orphans();
    assert_eq!(report.files_deleted, 0);
    assert_eq!(report.files_kept, 1);
    assert!(young.exists());
}
