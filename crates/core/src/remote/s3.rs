//! S3-backed remote store implementation.
//!
//! Works against any S3-compatible endpoint. Uploads deliberately omit an
//! explicit content type; the format maintenance sweep reconciles recorded
//! content types against the store afterwards.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, MetadataDirective, ObjectCannedAcl, ObjectIdentifier};
use aws_sdk_s3::Client;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::task::RemoteFileRef;

use super::config::RemoteStoreConfig;
use super::error::RemoteStoreError;
use super::traits::RemoteStore;
use super::types::RemoteObjectMetadata;

/// Remote store backed by an S3-compatible bucket.
pub struct S3RemoteStore {
    client: Client,
    bucket: String,
    key_prefix: Option<String>,
    download_dir: PathBuf,
}

impl S3RemoteStore {
    /// Build the client from configuration. Credentials are taken from the
    /// config rather than the ambient AWS environment.
    pub async fn new(config: RemoteStoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "dugout-remote-store",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        Self {
            client: Client::new(&aws_config),
            bucket: config.bucket,
            key_prefix: config.key_prefix,
            download_dir: config.download_dir,
        }
    }

    fn key(&self, file: &RemoteFileRef) -> String {
        let key = file.key();
        match &self.key_prefix {
            Some(prefix) if !prefix.trim().is_empty() => format!("{}/{}", prefix, key),
            _ => key,
        }
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn upload(
        &self,
        file: &RemoteFileRef,
        local_path: &Path,
    ) -> Result<(), RemoteStoreError> {
        let key = self.key(file);
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| RemoteStoreError::Upload {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| RemoteStoreError::Upload {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        debug!("Uploaded {} to {}", local_path.display(), key);
        Ok(())
    }

    async fn download(&self, file: &RemoteFileRef) -> Result<PathBuf, RemoteStoreError> {
        let key = self.key(file);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| RemoteStoreError::Download {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| RemoteStoreError::Download {
                key: key.clone(),
                reason: e.to_string(),
            })?
            .into_bytes();

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let local_path = self.download_dir.join(key.replace('/', "_"));
        tokio::fs::write(&local_path, &bytes).await?;

        debug!("Downloaded {} to {}", key, local_path.display());
        Ok(local_path)
    }

    async fn delete_files(&self, files: &[RemoteFileRef]) -> Result<(), RemoteStoreError> {
        if files.is_empty() {
            return Ok(());
        }

        let mut objects = Vec::with_capacity(files.len());
        for file in files {
            let identifier = ObjectIdentifier::builder()
                .key(self.key(file))
                .build()
                .map_err(|e| RemoteStoreError::Delete {
                    reason: e.to_string(),
                })?;
            objects.push(identifier);
        }
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| RemoteStoreError::Delete {
                reason: e.to_string(),
            })?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| RemoteStoreError::Delete {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn get_metadata(
        &self,
        file: &RemoteFileRef,
    ) -> Result<RemoteObjectMetadata, RemoteStoreError> {
        let key = self.key(file);
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| RemoteStoreError::Metadata {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        Ok(RemoteObjectMetadata {
            content_type: response.content_type().map(str::to_string),
            size_bytes: response.content_length(),
        })
    }

    async fn update_content_type(
        &self,
        file: &RemoteFileRef,
        content_type: &str,
    ) -> Result<(), RemoteStoreError> {
        let key = self.key(file);
        // In-place copy with a metadata rewrite; the only way S3 allows
        // changing an existing object's content type.
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(&key)
            .copy_source(format!("{}/{}", self.bucket, key))
            .content_type(content_type)
            .metadata_directive(MetadataDirective::Replace)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| RemoteStoreError::ContentTypeUpdate {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        debug!("Updated content type of {} to {}", key, content_type);
        Ok(())
    }
}
