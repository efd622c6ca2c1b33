//! src/services/storage_service.rs
//!
//! StorageService: a local object store backed by SQLite for the catalog
//! (buckets, objects, metadata) and local disk for object payloads. Payloads
//! live under `base_path/{bucket}/{shard}/{shard}/{payload}`, where `payload`
//! is a fresh name per put recorded on the object row; the catalog lives in
//! `base_path/.meta/object_store.db`.

use super::{Backend, ListPage, ListRequest, ObjectBody, ObjectReader, PutOptions};
use crate::{
    errors::{ClientError, ClientResult},
    models::{Bucket, Metadata, MetadataEntry, ObjectRecord, ObjectStat},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, TryStreamExt, pin_mut, stream};
use md5::Context;
use sqlx::{
    QueryBuilder, SqlitePool,
    migrate::Migrator,
    sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const OBJECT_COLUMNS: &str =
    "id, bucket_id, key, content_type, size_bytes, etag, last_modified, payload";

#[derive(Clone, Debug)]
pub struct ListObjectsParams {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: usize,
}

#[derive(Debug)]
pub struct ListObjectsResult {
    pub objects: Vec<ObjectRecord>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for ClientError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BucketNotFound(name) => {
                ClientError::not_found(format!("bucket `{name}`"))
            }
            StorageError::ObjectNotFound { bucket, key } => {
                ClientError::not_found(format!("object `{key}` in bucket `{bucket}`"))
            }
            StorageError::InvalidObjectKey(key) => {
                ClientError::invalid_key(key, "rejected by local store")
            }
            StorageError::InvalidBucketName { name, reason } => {
                ClientError::Config(format!("bucket `{name}` invalid: {reason}"))
            }
            other => ClientError::store("local store", other.to_string()),
        }
    }
}

/// StorageService provides S3-like operations on the local machine:
/// - Upload an object (streams bytes to disk, upserts catalog row + metadata)
/// - Get object (reads catalog row from SQLite and opens the payload)
/// - List objects (ordered catalog scan with delimiter grouping)
/// - Delete object (removes row, metadata and payload)
#[derive(Clone, Debug)]
pub struct StorageService {
    /// SQLite pool for the catalog.
    pub db: SqlitePool,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    label: String,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
pub const MAX_KEYS_PER_PAGE: usize = 1000;
const PAYLOAD_OPEN_ATTEMPTS: usize = 3;

impl StorageService {
    /// Open (or create) a store rooted at `base_path` and bring its catalog
    /// schema up to date.
    pub async fn open(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        let meta_dir = base_path.join(".meta");
        if !meta_dir.exists() {
            fs::create_dir_all(&meta_dir).await?;
            info!("Created catalog directory at {}", meta_dir.display());
        }

        let options = SqliteConnectOptions::new()
            .filename(meta_dir.join("object_store.db"))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&db).await?;
        debug!("catalog ready under {}", meta_dir.display());

        let label = format!("file://{}", base_path.display());
        Ok(Self {
            db,
            base_path,
            label,
        })
    }

    /// Key validation. Keys never become path components (payload files are
    /// named by digest), so only obviously broken keys are refused.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey(key.to_string()));
        }
        if key.bytes().any(|b| b.is_ascii_control()) {
            return Err(StorageError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(&self, name: &str) -> StorageResult<()> {
        validate_bucket_name(name).map_err(|reason| StorageError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Two-level shard directory for a key: the first two bytes of
    /// MD5(bucket/key). The key's own `/` never shapes the directory tree.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, bucket_name: &str, key: &str, payload: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(payload);
        path
    }

    async fn find_bucket(&self, bucket: &str) -> StorageResult<Option<Bucket>> {
        self.ensure_bucket_name_safe(bucket)?;
        let row = sqlx::query_as::<Sqlite, Bucket>(
            "SELECT id, name, created_at FROM buckets WHERE name = ?",
        )
        .bind(bucket)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn fetch_bucket(&self, bucket: &str) -> StorageResult<Bucket> {
        self.find_bucket(bucket)
            .await?
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))
    }

    async fn fetch_object(&self, bucket: &Bucket, key: &str) -> StorageResult<ObjectRecord> {
        sqlx::query_as::<_, ObjectRecord>(&format!(
            "SELECT {OBJECT_COLUMNS} FROM objects WHERE key = ? AND bucket_id = ?"
        ))
        .bind(key)
        .bind(bucket.id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| StorageError::ObjectNotFound {
            bucket: bucket.name.clone(),
            key: key.to_string(),
        })
    }

    async fn fetch_metadata(&self, object_id: Uuid) -> StorageResult<Metadata> {
        let rows = sqlx::query_as::<_, MetadataEntry>(
            "SELECT id, object_id, key, value FROM object_metadata WHERE object_id = ?",
        )
        .bind(object_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
    }

    pub async fn bucket_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.find_bucket(name).await?.is_some())
    }

    /// Create a bucket and its directory. Creating an existing bucket is a no-op.
    pub async fn create_bucket(&self, name: &str) -> StorageResult<Bucket> {
        self.ensure_bucket_name_safe(name)?;
        fs::create_dir_all(self.bucket_root(name)).await?;

        sqlx::query(
            "INSERT INTO buckets (id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        self.fetch_bucket(name).await
    }

    /// Stream-upload an object to disk and update the catalog.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Computes MD5/etag and size while streaming.
    /// - After fsync, renames it to a payload name no other put uses.
    /// - Upserts the object row and replaces its metadata in one transaction.
    /// - Only after the commit removes the payload the row pointed at before.
    ///
    /// Concurrent puts to one key each keep their own file, so the committed
    /// row always describes the bytes on disk. On any failure only the new
    /// file is removed and the previous version stays readable.
    pub async fn upload_object_stream<S>(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
        stream: S,
    ) -> StorageResult<ObjectRecord>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;

        let payload = Uuid::new_v4().simple().to_string();
        let file_path = self.object_path(&bucket_rec.name, key, &payload);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        let tmp_path = parent.join(format!(".tmp-{payload}"));
        let mut file = create_in_dir(&parent, &tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        let etag = format!("{:x}", digest.compute());
        let (record, replaced) = match self
            .write_catalog(&bucket_rec, key, &payload, options, size_bytes, &etag)
            .await
        {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                return Err(err);
            }
        };

        if let Some(old) = replaced.filter(|old| *old != payload) {
            let old_path = self.object_path(&bucket_rec.name, key, &old);
            if let Err(err) = fs::remove_file(&old_path).await {
                if err.kind() != ErrorKind::NotFound {
                    warn!(
                        "failed to remove replaced payload {}: {}",
                        old_path.display(),
                        err
                    );
                }
            }
        }

        debug!(
            "stored {}/{} ({} bytes, etag {})",
            bucket_rec.name, key, size_bytes, etag
        );
        Ok(record)
    }

    /// Upsert the object row (overwrite semantics) and swap its metadata.
    ///
    /// Returns the new row and the payload name it replaced, if any.
    async fn write_catalog(
        &self,
        bucket: &Bucket,
        key: &str,
        payload: &str,
        options: &PutOptions,
        size_bytes: i64,
        etag: &str,
    ) -> StorageResult<(ObjectRecord, Option<String>)> {
        let mut tx = self.db.begin().await?;

        // The first statement writes, so the transaction holds the write lock
        // before it reads the payload it is about to replace.
        sqlx::query(
            "DELETE FROM object_metadata WHERE object_id IN
             (SELECT id FROM objects WHERE bucket_id = ? AND key = ?)",
        )
        .bind(bucket.id)
        .bind(key)
        .execute(&mut *tx)
        .await?;

        let replaced: Option<String> =
            sqlx::query_scalar("SELECT payload FROM objects WHERE bucket_id = ? AND key = ?")
                .bind(bucket.id)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;

        let record = sqlx::query_as::<_, ObjectRecord>(&format!(
            r#"
            INSERT INTO objects (
                id, bucket_id, key, content_type, size_bytes, etag, last_modified, payload
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket_id, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                payload = excluded.payload
            RETURNING {OBJECT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(bucket.id)
        .bind(key)
        .bind(options.content_type.clone())
        .bind(size_bytes)
        .bind(etag)
        .bind(Utc::now())
        .bind(payload)
        .fetch_one(&mut *tx)
        .await?;

        for (name, value) in options.metadata.iter() {
            sqlx::query(
                "INSERT INTO object_metadata (id, object_id, key, value) VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(record.id)
            .bind(name)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((record, replaced))
    }

    /// Fetch an object for reading.
    ///
    /// Returns the catalog row and an opened File handle ready for streaming out.
    /// A put that lands between the row read and the open removes the payload
    /// that row named; the row is then read again. Returns ObjectNotFound if
    /// the row exists but its payload keeps missing.
    pub async fn get_object_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(ObjectRecord, File)> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;

        for _ in 0..PAYLOAD_OPEN_ATTEMPTS {
            let object = self.fetch_object(&bucket_rec, key).await?;
            let file_path = self.object_path(&bucket_rec.name, key, &object.payload);
            match File::open(&file_path).await {
                Ok(file) => return Ok((object, file)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("payload {} gone, re-reading row", file_path.display());
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        Err(StorageError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Catalog row plus user metadata.
    pub async fn get_object_metadata(&self, bucket: &str, key: &str) -> StorageResult<ObjectStat> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let object = self.fetch_object(&bucket_rec, key).await?;
        let metadata = self.fetch_metadata(object.id).await?;
        Ok(object.stat(metadata))
    }

    /// List objects following S3 ListObjectsV2 rules.
    ///
    /// Supports:
    /// - prefix filtering (case-sensitive)
    /// - delimiter grouping
    /// - continuation tokens (the last key consumed)
    /// - lexicographical ordering
    ///
    /// Rows are streamed from SQLite and the scan stops as soon as the page is
    /// full. A common prefix is never split across two pages: every row under
    /// the last prefix of a page is consumed before the token is taken.
    pub async fn list_objects(
        &self,
        bucket: &str,
        params: ListObjectsParams,
    ) -> StorageResult<ListObjectsResult> {
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let max_keys = params.max_keys.clamp(1, MAX_KEYS_PER_PAGE);
        let prefix = params.prefix.as_deref().filter(|p| !p.is_empty());

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {OBJECT_COLUMNS} FROM objects WHERE bucket_id = "
        ));
        builder.push_bind(bucket_rec.id);

        if let Some(prefix) = prefix {
            // `LIKE` folds ASCII case; `instr` does not.
            builder.push(" AND key >= ");
            builder.push_bind(prefix.to_string());
            builder.push(" AND instr(key, ");
            builder.push_bind(prefix.to_string());
            builder.push(") = 1");
        }

        if let Some(token) = &params.continuation_token {
            builder.push(" AND key > ");
            builder.push_bind(token.clone());
        }

        builder.push(" ORDER BY key ASC");

        let mut objects = Vec::new();
        let mut common_prefixes: Vec<String> = Vec::new();
        let mut last_key: Option<String> = None;
        let mut is_truncated = false;

        {
            let mut rows = builder.build_query_as::<ObjectRecord>().fetch(&self.db);
            while let Some(obj) = rows.try_next().await? {
                let grouped = params
                    .delimiter
                    .as_deref()
                    .and_then(|delim| compute_common_prefix(&obj.key, prefix, delim));

                if let Some(group) = &grouped {
                    if common_prefixes.last() == Some(group) {
                        last_key = Some(obj.key);
                        continue;
                    }
                }
                if objects.len() + common_prefixes.len() == max_keys {
                    is_truncated = true;
                    break;
                }

                last_key = Some(obj.key.clone());
                match grouped {
                    Some(group) => common_prefixes.push(group),
                    None => objects.push(obj),
                }
            }
        }

        Ok(ListObjectsResult {
            objects,
            common_prefixes,
            is_truncated,
            next_continuation_token: if is_truncated { last_key } else { None },
        })
    }

    /// Delete an object, its metadata and its payload.
    ///
    /// Returns whether the key existed. Prunes empty shard directories.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;

        let mut tx = self.db.begin().await?;
        // Metadata rows reference the object, so they go first.
        sqlx::query(
            "DELETE FROM object_metadata WHERE object_id IN
             (SELECT id FROM objects WHERE bucket_id = ? AND key = ?)",
        )
        .bind(bucket_rec.id)
        .bind(key)
        .execute(&mut *tx)
        .await?;
        let removed: Option<String> = sqlx::query_scalar(
            "DELETE FROM objects WHERE bucket_id = ? AND key = ? RETURNING payload",
        )
        .bind(bucket_rec.id)
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        let Some(payload) = removed else {
            debug!("{}/{} already absent", bucket_rec.name, key);
            return Ok(false);
        };

        let file_path = self.object_path(&bucket_rec.name, key, &payload);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(&bucket_rec.name);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(true)
    }

    /// Recursively remove empty directories up to bucket root.
    ///
    /// Stops when:
    /// - directory not empty
    /// - directory not found
    /// - reached root
    /// - encountered unexpected I/O errors
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Backend for StorageService {
    fn endpoint(&self) -> &str {
        &self.label
    }

    async fn bucket_exists(&self, bucket: &str) -> ClientResult<bool> {
        Ok(StorageService::bucket_exists(self, bucket).await?)
    }

    async fn create_bucket(&self, bucket: &str) -> ClientResult<()> {
        StorageService::create_bucket(self, bucket).await?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        options: &PutOptions,
    ) -> ClientResult<Option<String>> {
        let record = match body {
            ObjectBody::Bytes(data) => {
                let chunks = stream::once(async move { Ok::<_, io::Error>(data) });
                self.upload_object_stream(bucket, key, options, chunks)
                    .await?
            }
            ObjectBody::File(path) => {
                let file = File::open(&path)
                    .await
                    .map_err(|err| ClientError::local_io(&path, err))?;
                self.upload_object_stream(bucket, key, options, ReaderStream::new(file))
                    .await?
            }
        };
        Ok(Some(record.etag))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectReader> {
        let (_, file) = self.get_object_reader(bucket, key).await?;
        Ok(Box::pin(file))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectStat> {
        Ok(self.get_object_metadata(bucket, key).await?)
    }

    async fn list_page(&self, bucket: &str, request: &ListRequest) -> ClientResult<ListPage> {
        let result = self
            .list_objects(
                bucket,
                ListObjectsParams {
                    prefix: Some(request.prefix.clone()),
                    delimiter: request.delimiter.clone(),
                    continuation_token: request.continuation_token.clone(),
                    max_keys: MAX_KEYS_PER_PAGE,
                },
            )
            .await?;

        Ok(ListPage {
            objects: result.objects.iter().map(ObjectRecord::summary).collect(),
            common_prefixes: result.common_prefixes,
            next_token: result.next_continuation_token,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        StorageService::delete_object(self, bucket, key).await?;
        Ok(())
    }
}

/// S3 bucket naming rules. Returns the violated rule.
pub fn validate_bucket_name(name: &str) -> Result<(), &'static str> {
    if name.trim() != name {
        return Err("cannot begin or end with whitespace");
    }
    if name.len() < BUCKET_NAME_MIN_LEN || name.len() > BUCKET_NAME_MAX_LEN {
        return Err("must be between 3 and 63 characters");
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err("allowed characters are lowercase letters, digits, dots, and hyphens");
    }
    if name.starts_with('.') || name.ends_with('.') || name.starts_with('-') || name.ends_with('-')
    {
        return Err("must start and end with a lowercase letter or digit");
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err("cannot contain consecutive dots or dot-hyphen combinations");
    }
    if is_ipv4_like(name) {
        return Err("must not be formatted like an IP address");
    }
    Ok(())
}

/// Compute the "common prefix" a key folds into under S3 list semantics.
///
/// Returns Some(prefix) if the key has `delimiter` somewhere after the
/// requested prefix, otherwise None.
fn compute_common_prefix(
    key: &str,
    requested_prefix: Option<&str>,
    delimiter: &str,
) -> Option<String> {
    let prefix = requested_prefix.unwrap_or("");
    let after_prefix = key.strip_prefix(prefix)?;
    let pos = after_prefix.find(delimiter)?;
    Some(format!(
        "{}{}",
        prefix,
        &after_prefix[..pos + delimiter.len()]
    ))
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|segment| {
        !segment.is_empty()
            && segment.len() <= 3
            && segment.chars().all(|c| c.is_ascii_digit())
            && segment.parse::<u8>().is_ok()
    })
}

/// Create `path` inside `dir`, recreating `dir` if a concurrent delete pruned
/// it in between.
async fn create_in_dir(dir: &Path, path: &Path) -> io::Result<File> {
    fs::create_dir_all(dir).await?;
    match File::create(path).await {
        Err(err) if err.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(dir).await?;
            File::create(path).await
        }
        other => other,
    }
}
