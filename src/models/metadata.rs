//! User-defined object metadata and its normalization rules.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Header prefix S3 uses to carry user metadata on the wire.
pub const RESERVED_PREFIX: &str = "x-amz-meta-";

/// String-to-string user metadata attached to an object.
///
/// Keys are normalized on the way in: surrounding whitespace is trimmed, the
/// key is lowercased, and a leading `x-amz-meta-` (any case) is stripped. So
/// `{"X-Amz-Meta-Version": "1.0"}` and `{"version": "1.0"}` are the same map.
/// Keys left empty after normalization are dropped.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair, normalizing the key. Returns the previous value.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        let key = normalize_key(key.as_ref())?;
        self.0.insert(key, value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = normalize_key(key)?;
        self.0.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = Metadata::new();
        for (k, v) in iter {
            meta.insert(k, v);
        }
        meta
    }
}

impl IntoIterator for Metadata {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Lowercase, trimmed, reserved prefix removed. `None` if nothing is left.
pub fn normalize_key(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_ascii_lowercase();
    let stripped = lowered
        .strip_prefix(RESERVED_PREFIX)
        .map(str::to_string)
        .unwrap_or(lowered);
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// A single metadata row in the local backend's catalog.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct MetadataEntry {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Reference to the associated object.
    pub object_id: Uuid,

    /// Normalized metadata key (no `x-amz-meta-` prefix).
    pub key: String,

    /// Metadata value as plain text.
    pub value: String,
}
