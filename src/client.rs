//! `ObjectStoreClient`, the opinionated facade over a [`Backend`].
//!
//! Holds the immutable default bucket and a shared backend handle. Each
//! method is one independent round trip (or a short fixed sequence of them);
//! there is no cache and no retry.

use crate::{
    config::EndpointConfig,
    errors::{ClientError, ClientResult},
    models::{Metadata, ObjectStat, ObjectSummary},
    services::{
        Backend, ListPage, ListRequest, ObjectBody, PutOptions, s3_service::S3Service,
        storage_service::StorageService,
    },
};
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt, stream};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, io::AsyncReadExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Input of [`ObjectStoreClient::put_with_metadata`].
#[derive(Debug, Clone)]
pub enum ObjectSource {
    File(PathBuf),
    Bytes(Bytes),
}

impl From<&Path> for ObjectSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<PathBuf> for ObjectSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<Bytes> for ObjectSource {
    fn from(data: Bytes) -> Self {
        Self::Bytes(data)
    }
}

impl From<Vec<u8>> for ObjectSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(data))
    }
}

#[derive(Clone)]
pub struct ObjectStoreClient {
    backend: Arc<dyn Backend>,
    bucket: String,
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient")
            .field("endpoint", &self.backend.endpoint())
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl ObjectStoreClient {
    /// Build the backend `cfg` points at and make sure its bucket exists.
    ///
    /// `file://<dir>` endpoints open the local store; anything else goes to
    /// the S3 transport.
    pub async fn connect(cfg: &EndpointConfig) -> ClientResult<Self> {
        let backend: Arc<dyn Backend> = match cfg.local_root() {
            Some(root) => Arc::new(StorageService::open(&root).await.map_err(|err| {
                ClientError::Connection {
                    endpoint: cfg.endpoint.clone(),
                    message: err.to_string(),
                }
            })?),
            None => Arc::new(S3Service::new(cfg).await),
        };
        Self::with_backend(cfg.bucket_name.clone(), backend).await
    }

    /// Wrap an existing backend. Also ensures the bucket exists.
    pub async fn with_backend(
        bucket: impl Into<String>,
        backend: Arc<dyn Backend>,
    ) -> ClientResult<Self> {
        let client = Self {
            backend,
            bucket: bucket.into(),
        };
        client.ensure_bucket().await?;
        Ok(client)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn endpoint(&self) -> &str {
        self.backend.endpoint()
    }

    /// Create the default bucket unless it already exists. Safe to repeat.
    pub async fn ensure_bucket(&self) -> ClientResult<()> {
        if self.backend.bucket_exists(&self.bucket).await? {
            debug!("bucket '{}' already exists", self.bucket);
            return Ok(());
        }
        self.backend.create_bucket(&self.bucket).await?;
        info!("bucket '{}' created on {}", self.bucket, self.endpoint());
        Ok(())
    }

    /// Upload a local file. `key` defaults to the file's base name.
    pub async fn put_file(
        &self,
        local_path: impl AsRef<Path>,
        key: Option<&str>,
    ) -> ClientResult<String> {
        let local_path = local_path.as_ref();
        let key = match key {
            Some(key) => key.to_string(),
            None => default_key(local_path)?,
        };
        self.put_with_options(
            ObjectSource::File(local_path.to_path_buf()),
            &key,
            PutOptions::default(),
        )
        .await?;
        Ok(key)
    }

    /// Upload an in-memory buffer. A zero-length buffer is a valid object.
    pub async fn put_bytes(&self, data: impl Into<Bytes>, key: &str) -> ClientResult<()> {
        self.put_with_options(ObjectSource::Bytes(data.into()), key, PutOptions::default())
            .await?;
        Ok(())
    }

    /// Upload with user metadata. A later put to the same key replaces the
    /// metadata wholesale.
    pub async fn put_with_metadata(
        &self,
        source: impl Into<ObjectSource>,
        key: &str,
        metadata: Metadata,
    ) -> ClientResult<()> {
        let options = PutOptions {
            content_type: None,
            metadata,
        };
        self.put_with_options(source.into(), key, options).await?;
        Ok(())
    }

    /// Write a zero-length folder marker. A trailing `/` is added if missing.
    pub async fn create_folder(&self, key: &str) -> ClientResult<String> {
        let key = if key.ends_with('/') {
            key.to_string()
        } else {
            format!("{key}/")
        };
        self.put_bytes(Bytes::new(), &key).await?;
        Ok(key)
    }

    /// General put; the other put operations delegate here. Returns the ETag.
    pub async fn put_with_options(
        &self,
        source: ObjectSource,
        key: &str,
        options: PutOptions,
    ) -> ClientResult<Option<String>> {
        if key.is_empty() {
            return Err(ClientError::invalid_key(key, "key must not be empty"));
        }

        let body = match source {
            ObjectSource::Bytes(data) => {
                if key.ends_with('/') && !data.is_empty() {
                    return Err(ClientError::invalid_key(
                        key,
                        "folder markers (keys ending in '/') must be empty",
                    ));
                }
                ObjectBody::Bytes(data)
            }
            ObjectSource::File(path) => {
                let meta = match fs::metadata(&path).await {
                    Ok(meta) => meta,
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        return Err(ClientError::not_found(format!(
                            "local file `{}`",
                            path.display()
                        )));
                    }
                    Err(err) => return Err(ClientError::local_io(&path, err)),
                };
                if !meta.is_file() {
                    return Err(ClientError::local_io(
                        &path,
                        std::io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
                    ));
                }
                if key.ends_with('/') && meta.len() > 0 {
                    return Err(ClientError::invalid_key(
                        key,
                        "folder markers (keys ending in '/') must be empty",
                    ));
                }
                ObjectBody::File(path)
            }
        };

        // Deserialized maps bypass `Metadata::insert`; re-normalize.
        let options = PutOptions {
            content_type: options.content_type,
            metadata: options.metadata.into_iter().collect(),
        };
        let etag = self
            .backend
            .put_object(&self.bucket, key, body, &options)
            .await?;
        info!("uploaded '{}' to bucket '{}'", key, self.bucket);
        Ok(etag)
    }

    /// Download `key` into `local_path` (defaults to `key` itself).
    ///
    /// Missing parent directories are created. The payload is written to a
    /// temporary sibling and renamed into place, so a failed download leaves
    /// nothing at `local_path`. Returns the path written.
    ///
    /// A folder-marker key (ending in `/`) has no payload to write: after
    /// checking that the marker exists, the target is created as a directory.
    pub async fn get_to_file(
        &self,
        key: &str,
        local_path: Option<&Path>,
    ) -> ClientResult<PathBuf> {
        let target = local_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(key));

        if key.ends_with('/') {
            self.stat(key).await?;
            fs::create_dir_all(&target)
                .await
                .map_err(|err| ClientError::local_io(&target, err))?;
            info!("materialized folder '{}' at {}", key, target.display());
            return Ok(target);
        }

        let mut reader = self.backend.get_object(&self.bucket, key).await?;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| ClientError::local_io(parent, err))?;
        }

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ClientError::local_io(
                    &target,
                    std::io::Error::new(ErrorKind::InvalidInput, "target has no file name"),
                )
            })?;
        let tmp_path = target.with_file_name(format!(".{file_name}.tmp-{}", Uuid::new_v4()));

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|err| ClientError::local_io(&tmp_path, err))?;
        let copied = tokio::io::copy(&mut reader, &mut file).await;
        let synced = match copied {
            Ok(_) => file.sync_all().await,
            Err(err) => Err(err),
        };
        drop(file);
        if let Err(err) = synced {
            let _ = fs::remove_file(&tmp_path).await;
            warn!("download of '{}' interrupted: {}", key, err);
            return Err(ClientError::store("GetObject", err.to_string()));
        }

        if let Err(err) = fs::rename(&tmp_path, &target).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ClientError::local_io(&target, err));
        }

        info!("downloaded '{}' to {}", key, target.display());
        Ok(target)
    }

    /// Download the whole payload. Never returns partial data: a transfer
    /// that breaks midway is an error.
    pub async fn get_bytes(&self, key: &str) -> ClientResult<Bytes> {
        let mut reader = self.backend.get_object(&self.bucket, key).await?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|err| ClientError::store("GetObject", err.to_string()))?;
        Ok(Bytes::from(buf))
    }

    /// Size, timestamps, ETag, content type and normalized metadata of `key`.
    pub async fn stat(&self, key: &str) -> ClientResult<ObjectStat> {
        self.backend.head_object(&self.bucket, key).await
    }

    /// `stat` reduced to presence.
    pub async fn exists(&self, key: &str) -> ClientResult<bool> {
        match self.stat(key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Remove `key`. Removing a key that is not there succeeds.
    pub async fn delete(&self, key: &str) -> ClientResult<()> {
        self.backend.delete_object(&self.bucket, key).await?;
        info!("deleted '{}' from bucket '{}'", key, self.bucket);
        Ok(())
    }

    /// Lazily stream the keys under `prefix`, in key order.
    ///
    /// With `recursive == false` only one level of the `/` hierarchy is
    /// returned: deeper keys fold into one `is_dir` entry per common prefix.
    /// Pages are fetched from the backend only as the stream is polled.
    pub fn list(
        &self,
        prefix: &str,
        recursive: bool,
    ) -> impl Stream<Item = ClientResult<ObjectSummary>> + Send + use<> {
        let backend = Arc::clone(&self.backend);
        let bucket = self.bucket.clone();
        let request = ListRequest {
            prefix: prefix.to_string(),
            delimiter: (!recursive).then(|| "/".to_string()),
            continuation_token: None,
        };

        stream::try_unfold(Some(request), move |state| {
            let backend = Arc::clone(&backend);
            let bucket = bucket.clone();
            async move {
                let Some(mut request) = state else {
                    return Ok(None);
                };
                let page = backend.list_page(&bucket, &request).await?;
                let next = page.next_token.clone().map(|token| {
                    request.continuation_token = Some(token);
                    request
                });
                Ok::<_, ClientError>(Some((merge_page(page), next)))
            }
        })
        .map_ok(|entries| stream::iter(entries.into_iter().map(Ok::<_, ClientError>)))
        .try_flatten()
    }

    /// [`list`](Self::list), collected.
    pub async fn list_all(
        &self,
        prefix: &str,
        recursive: bool,
    ) -> ClientResult<Vec<ObjectSummary>> {
        self.list(prefix, recursive).try_collect().await
    }
}

/// Objects and directory entries of one page, interleaved by key.
fn merge_page(page: ListPage) -> Vec<ObjectSummary> {
    let mut entries = page.objects;
    entries.extend(page.common_prefixes.into_iter().map(ObjectSummary::directory));
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}

fn default_key(path: &Path) -> ClientResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ClientError::invalid_key(
                path.display().to_string(),
                "path has no file name to use as key",
            )
        })
}
