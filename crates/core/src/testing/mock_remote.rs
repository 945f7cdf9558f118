//! Mock remote store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::remote::{RemoteObjectMetadata, RemoteStore, RemoteStoreError};
use crate::task::RemoteFileRef;

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub key: String,
    pub local_path: PathBuf,
}

/// Mock implementation of the [`RemoteStore`] trait.
///
/// Keeps an in-memory object table keyed by remote key. Content types
/// mimic the production store's behavior: uploads without an explicit
/// type get one inferred from the extension, except QuickTime files,
/// which get the bogus `binary/octet-stream` the content-type sweeper
/// exists to correct.
#[derive(Debug, Clone)]
pub struct MockRemoteStore {
    download_dir: PathBuf,
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    /// Current remote content type per key.
    content_types: Arc<RwLock<HashMap<String, String>>>,
    next_error: Arc<RwLock<Option<RemoteStoreError>>>,
    deleted_keys: Arc<RwLock<Vec<String>>>,
}

impl MockRemoteStore {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            uploads: Arc::new(RwLock::new(Vec::new())),
            content_types: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            deleted_keys: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    pub async fn uploaded_keys(&self) -> Vec<String> {
        self.uploads.read().await.iter().map(|u| u.key.clone()).collect()
    }

    pub async fn upload_count(&self) -> usize {
        self.uploads.read().await.len()
    }

    pub async fn deleted_keys(&self) -> Vec<String> {
        self.deleted_keys.read().await.clone()
    }

    /// Pre-seed an object so metadata and downloads work without an
    /// upload, as for assets that predate the test.
    pub async fn seed_object(&self, file: &RemoteFileRef, content_type: &str) {
        self.content_types
            .write()
            .await
            .insert(file.key(), content_type.to_string());
    }

    /// Override the content type reported for a key.
    pub async fn set_content_type(&self, file: &RemoteFileRef, content_type: &str) {
        self.seed_object(file, content_type).await;
    }

    pub async fn remote_content_type(&self, file: &RemoteFileRef) -> Option<String> {
        self.content_types.read().await.get(&file.key()).cloned()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: RemoteStoreError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<RemoteStoreError> {
        self.next_error.write().await.take()
    }

    /// Content type the store would infer at upload time. QuickTime gets
    /// the known-bad generic type.
    fn inferred_content_type(key: &str) -> &'static str {
        let extension = key.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        match extension {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "heic" => "image/heic",
            "mp4" => "video/mp4",
            "mov" => "binary/octet-stream",
            _ => "application/octet-stream",
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(
        &self,
        file: &RemoteFileRef,
        local_path: &Path,
    ) -> Result<(), RemoteStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let key = file.key();
        self.content_types
            .write()
            .await
            .insert(key.clone(), Self::inferred_content_type(&key).to_string());
        self.uploads.write().await.push(RecordedUpload {
            key,
            local_path: local_path.to_path_buf(),
        });
        Ok(())
    }

    async fn download(&self, file: &RemoteFileRef) -> Result<PathBuf, RemoteStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let key = file.key();
        if !self.content_types.read().await.contains_key(&key) {
            return Err(RemoteStoreError::NotFound { key });
        }
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let local_path = self.download_dir.join(key.replace('/', "_"));
        tokio::fs::write(&local_path, b"mock remote object").await?;
        Ok(local_path)
    }

    async fn delete_files(&self, files: &[RemoteFileRef]) -> Result<(), RemoteStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let mut content_types = self.content_types.write().await;
        let mut deleted = self.deleted_keys.write().await;
        for file in files {
            let key = file.key();
            content_types.remove(&key);
            deleted.push(key);
        }
        Ok(())
    }

    async fn get_metadata(
        &self,
        file: &RemoteFileRef,
    ) -> Result<RemoteObjectMetadata, RemoteStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let key = file.key();
        match self.content_types.read().await.get(&key) {
            Some(content_type) => Ok(RemoteObjectMetadata {
                content_type: Some(content_type.clone()),
                size_bytes: Some(1024),
            }),
            None => Err(RemoteStoreError::NotFound { key }),
        }
    }

    async fn update_content_type(
        &self,
        file: &RemoteFileRef,
        content_type: &str,
    ) -> Result<(), RemoteStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let key = file.key();
        let mut content_types = self.content_types.write().await;
        if !content_types.contains_key(&key) {
            return Err(RemoteStoreError::NotFound { key });
        }
        content_types.insert(key, content_type.to_string());
        Ok(())
    }
}
