//! Remote store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the S3-compatible remote store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteStoreConfig {
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible services (e.g. Spaces, MinIO).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    pub access_key: String,
    pub secret_key: String,

    /// Optional key prefix, used to isolate test uploads.
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Directory downloaded objects are written to.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("dugout-media")
}
