//! Grouping of uploaded files into media units.
//!
//! Files are grouped by base filename: an image and a video sharing one
//! base name form a live photo. Kind inference comes from the reported
//! content type of each file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use super::types::{MediaKind, NewMediaUnit, SourceFileRef};

/// One uploaded file staged in the scratch directory.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Filename as uploaded.
    pub file_name: String,
    /// Content type reported with the upload.
    pub content_type: String,
    /// Where the bytes were staged locally.
    pub local_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("unsupported file type '{content_type}' for file '{file_name}'")]
    UnsupportedFileType {
        file_name: String,
        content_type: String,
    },

    #[error("duplicate file name '{base_name}' with unexpected types: {existing} and {content_type}")]
    ConflictingPair {
        base_name: String,
        existing: &'static str,
        content_type: String,
    },
}

/// Group uploaded files into media units, pairing image/video files that
/// share a base name into live photos. Unit order follows first appearance
/// of each base name.
pub fn group_uploads(files: Vec<IncomingFile>) -> Result<Vec<NewMediaUnit>, IntakeError> {
    // BTreeMap of base name -> (first-seen order, unit)
    let mut units: BTreeMap<String, (usize, NewMediaUnit)> = BTreeMap::new();

    for file in files {
        let base_name = base_name_of(&file.file_name);
        let source = SourceFileRef {
            path: file.local_path.clone(),
            original_name: file.file_name.clone(),
        };

        if let Some((_, unit)) = units.get_mut(&base_name) {
            if unit.kind == MediaKind::Photo && file.content_type.starts_with("video/") {
                unit.video = Some(source);
                unit.kind = MediaKind::LivePhoto;
            } else if unit.kind == MediaKind::Video && file.content_type.starts_with("image/") {
                unit.photo = Some(source);
                unit.kind = MediaKind::LivePhoto;
            } else {
                return Err(IntakeError::ConflictingPair {
                    base_name,
                    existing: unit.kind.as_str(),
                    content_type: file.content_type,
                });
            }
        } else if file.content_type.starts_with("image/") {
            let order = units.len();
            units.insert(
                base_name.clone(),
                (
                    order,
                    NewMediaUnit {
                        base_name,
                        kind: MediaKind::Photo,
                        photo: Some(source),
                        video: None,
                    },
                ),
            );
        } else if file.content_type.starts_with("video/") {
            let order = units.len();
            units.insert(
                base_name.clone(),
                (
                    order,
                    NewMediaUnit {
                        base_name,
                        kind: MediaKind::Video,
                        photo: None,
                        video: Some(source),
                    },
                ),
            );
        } else {
            return Err(IntakeError::UnsupportedFileType {
                file_name: file.file_name,
                content_type: file.content_type,
            });
        }
    }

    let mut ordered: Vec<(usize, NewMediaUnit)> = units.into_values().collect();
    ordered.sort_by_key(|(order, _)| *order);
    Ok(ordered.into_iter().map(|(_, unit)| unit).collect())
}

/// Filename without its extension.
fn base_name_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => base.to_string(),
        _ => file_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(name: &str, content_type: &str) -> IncomingFile {
        IncomingFile {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            local_path: PathBuf::from(format!("/scratch/{}", name)),
        }
    }

    #[test]
    fn groups_singles_by_content_type() {
        let units = group_uploads(vec![
            incoming("IMG_1.heic", "image/heic"),
            incoming("clip.mov", "video/quicktime"),
        ])
        .unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].kind, MediaKind::Photo);
        assert!(units[0].photo.is_some());
        assert!(units[0].video.is_none());
        assert_eq!(units[1].kind, MediaKind::Video);
        assert!(units[1].video.is_some());
    }

    #[test]
    fn pairs_shared_base_name_into_live_photo() {
        let units = group_uploads(vec![
            incoming("IMG_2.heic", "image/heic"),
            incoming("IMG_2.mov", "video/quicktime"),
        ])
        .unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, MediaKind::LivePhoto);
        assert!(units[0].photo.is_some());
        assert!(units[0].video.is_some());
    }

    #[test]
    fn pairs_in_either_arrival_order() {
        let units = group_uploads(vec![
            incoming("IMG_3.mov", "video/quicktime"),
            incoming("IMG_3.jpg", "image/jpeg"),
        ])
        .unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, MediaKind::LivePhoto);
    }

    #[test]
    fn preserves_first_seen_order() {
        let units = group_uploads(vec![
            incoming("b.jpg", "image/jpeg"),
            incoming("a.jpg", "image/jpeg"),
            incoming("b.mov", "video/quicktime"),
        ])
        .unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].base_name, "b");
        assert_eq!(units[0].kind, MediaKind::LivePhoto);
        assert_eq!(units[1].base_name, "a");
    }

    #[test]
    fn rejects_unsupported_content_type() {
        let err = group_uploads(vec![incoming("doc.pdf", "application/pdf")]).unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedFileType { .. }));
    }

    #[test]
    fn rejects_duplicate_base_name_of_same_type() {
        let err = group_uploads(vec![
            incoming("IMG_4.jpg", "image/jpeg"),
            incoming("IMG_4.png", "image/png"),
        ])
        .unwrap_err();
        assert!(matches!(err, IntakeError::ConflictingPair { .. }));
    }
}
