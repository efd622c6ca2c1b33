//! Storage backends behind [`ObjectStoreClient`](crate::ObjectStoreClient).
//!
//! A backend performs single round trips against one store and knows nothing
//! about default buckets, folder markers, or listing streams; the client
//! façade layers those on top.
//!
//! - [`s3_service::S3Service`] talks to any S3-compatible endpoint.
//! - [`storage_service::StorageService`] keeps objects on local disk with an
//!   SQLite catalog. It is selected with a `file://` endpoint.

pub mod s3_service;
pub mod storage_service;

use crate::{
    errors::ClientResult,
    models::{Metadata, ObjectStat, ObjectSummary},
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{path::PathBuf, pin::Pin};
use tokio::io::AsyncRead;

/// Streaming reader over an object payload.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Where the bytes of a put come from.
#[derive(Debug, Clone)]
pub enum ObjectBody {
    Bytes(Bytes),
    /// Streamed from disk by the backend. The path is known to exist.
    File(PathBuf),
}

/// Optional attributes of a put.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    /// Replaces whatever metadata the key had before.
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub prefix: String,
    /// `Some("/")` for one level of the virtual hierarchy.
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
}

/// One page of a listing. `objects` and `common_prefixes` are each sorted.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    /// Present when more pages follow.
    pub next_token: Option<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Endpoint description used in logs and connection errors.
    fn endpoint(&self) -> &str;

    async fn bucket_exists(&self, bucket: &str) -> ClientResult<bool>;

    /// Create `bucket`. A bucket that already exists is not an error.
    async fn create_bucket(&self, bucket: &str) -> ClientResult<()>;

    /// Store `body` under `key`, replacing payload and metadata. Returns the ETag.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        options: &PutOptions,
    ) -> ClientResult<Option<String>>;

    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectReader>;

    async fn head_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectStat>;

    async fn list_page(&self, bucket: &str, request: &ListRequest) -> ClientResult<ListPage>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()>;
}
