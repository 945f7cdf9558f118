//! Remote object storage for published media.

mod config;
mod error;
mod s3;
mod traits;
mod types;

pub use config::RemoteStoreConfig;
pub use error::RemoteStoreError;
pub use s3::S3RemoteStore;
pub use traits::RemoteStore;
pub use types::RemoteObjectMetadata;
