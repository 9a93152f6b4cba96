//! File metadata records.

use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type recorded when the caller does not supply one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Where the bytes of a file live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum FileContent {
    /// The bytes are stored inline in the record.
    Embedded(Vec<u8>),
    /// The bytes are split into content-addressed shards, in order.
    Sharded(Vec<ContentHash>),
}

/// Metadata record of one stored file, keyed by the hash of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Total size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime_type: String,
    /// Last modification time.
    pub modify_time: DateTime<Utc>,
    /// Number of `create` calls that stored this content and have not been
    /// matched by a `delete`.
    pub ref_count: u32,
    /// Embedded bytes or shard list.
    pub content: FileContent,
}

impl FileMeta {
    /// Creates a record with embedded bytes.
    #[must_use]
    pub fn embedded(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            size: data.len() as u64,
            mime_type: mime_type.into(),
            modify_time: Utc::now(),
            ref_count: 1,
            content: FileContent::Embedded(data),
        }
    }

    /// Creates a record referring to `shards`.
    #[must_use]
    pub fn sharded(size: u64, shards: Vec<ContentHash>, mime_type: impl Into<String>) -> Self {
        Self {
            size,
            mime_type: mime_type.into(),
            modify_time: Utc::now(),
            ref_count: 1,
            content: FileContent::Sharded(shards),
        }
    }

    /// Returns `true` if the bytes are embedded.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        matches!(self.content, FileContent::Embedded(_))
    }

    /// Returns the embedded bytes, if any.
    #[must_use]
    pub fn embedded_bytes(&self) -> Option<&[u8]> {
        match &self.content {
            FileContent::Embedded(data) => Some(data),
            FileContent::Sharded(_) => None,
        }
    }

    /// Returns the shard hashes; empty for embedded records.
    #[must_use]
    pub fn shards(&self) -> &[ContentHash] {
        match &self.content {
            FileContent::Embedded(_) => &[],
            FileContent::Sharded(shards) => shards,
        }
    }
}
