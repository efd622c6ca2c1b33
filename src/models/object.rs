//! Object views returned to callers, plus the local catalog row.

use super::metadata::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One entry of a listing.
///
/// With a non-recursive listing, keys nested below the requested level are
/// folded into a single entry with `is_dir == true`. Such entries carry the
/// common prefix (ending in `/`) as `key`, a size of zero, and no timestamp
/// or ETag.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub is_dir: bool,
}

impl ObjectSummary {
    /// Aggregated "directory" entry for a common prefix.
    pub fn directory(prefix: impl Into<String>) -> Self {
        Self {
            key: prefix.into(),
            size: 0,
            last_modified: None,
            etag: None,
            is_dir: true,
        }
    }
}

/// Full description of a single object, as returned by `stat`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectStat {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Content fingerprint with surrounding quotes removed.
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub metadata: Metadata,
}

/// An object row in the local backend's catalog.
///
/// Stores the description only; the payload lives on disk.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ObjectRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the parent bucket.
    pub bucket_id: Uuid,

    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Content type (MIME type), if the uploader supplied one.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: String,

    /// Timestamp of the last put to this key.
    pub last_modified: DateTime<Utc>,

    /// Payload file name inside the key's shard directory. Unique per put.
    pub payload: String,
}

impl ObjectRecord {
    pub fn summary(&self) -> ObjectSummary {
        ObjectSummary {
            key: self.key.clone(),
            size: self.size_bytes.max(0) as u64,
            last_modified: Some(self.last_modified),
            etag: Some(self.etag.clone()),
            is_dir: false,
        }
    }

    pub fn stat(&self, metadata: Metadata) -> ObjectStat {
        ObjectStat {
            key: self.key.clone(),
            size: self.size_bytes.max(0) as u64,
            last_modified: Some(self.last_modified),
            etag: Some(self.etag.clone()),
            content_type: self.content_type.clone(),
            metadata,
        }
    }
}

/// Strip the double quotes S3 puts around ETags.
pub fn clean_etag(raw: &str) -> String {
    raw.trim_matches('"').to_string()
}
