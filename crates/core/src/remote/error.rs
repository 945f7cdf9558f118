//! Error types for the remote store module.

use thiserror::Error;

/// Errors from the remote object store.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    #[error("Failed to upload {key}: {reason}")]
    Upload { key: String, reason: String },

    #[error("Failed to download {key}: {reason}")]
    Download { key: String, reason: String },

    #[error("Failed to fetch metadata for {key}: {reason}")]
    Metadata { key: String, reason: String },

    #[error("Failed to update content type for {key}: {reason}")]
    ContentTypeUpdate { key: String, reason: String },

    #[error("Failed to delete objects: {reason}")]
    Delete { reason: String },

    #[error("Remote object not found: {key}")]
    NotFound { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
