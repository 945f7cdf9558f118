//! Remote store result types.

/// Metadata reported by the remote store for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteObjectMetadata {
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
}
