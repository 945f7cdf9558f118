//! Trait definitions for the remote store module.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::task::RemoteFileRef;

use super::error::RemoteStoreError;
use super::types::RemoteObjectMetadata;

/// A remote object store holding published media files.
///
/// Objects are addressed by the deterministic key derived from a
/// [`RemoteFileRef`]; nothing about remote placement is persisted locally.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Upload a local file to the object for `file`.
    async fn upload(&self, file: &RemoteFileRef, local_path: &Path)
        -> Result<(), RemoteStoreError>;

    /// Download the object for `file` to a local scratch path and return it.
    async fn download(&self, file: &RemoteFileRef) -> Result<PathBuf, RemoteStoreError>;

    /// Delete every listed object, typically all variants of one asset.
    async fn delete_files(&self, files: &[RemoteFileRef]) -> Result<(), RemoteStoreError>;

    /// Fetch the store's metadata for the object.
    async fn get_metadata(
        &self,
        file: &RemoteFileRef,
    ) -> Result<RemoteObjectMetadata, RemoteStoreError>;

    /// Rewrite the object's content type in place.
    async fn update_content_type(
        &self,
        file: &RemoteFileRef,
        content_type: &str,
    ) -> Result<(), RemoteStoreError>;
}
