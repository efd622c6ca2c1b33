//! S3 transport built on `aws-sdk-s3`.
//!
//! Requests use static credentials and path-style addressing so that MinIO
//! and other self-hosted stores work without DNS tricks. Errors are sorted
//! into the client's error kinds here; nothing is retried beyond what the
//! SDK's own transport does.

use super::{Backend, ListPage, ListRequest, ObjectBody, ObjectReader, PutOptions};
use crate::{
    config::EndpointConfig,
    errors::{ClientError, ClientResult},
    models::{Metadata, ObjectStat, ObjectSummary, object::clean_etag},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region, http::HttpResponse},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::{ByteStream, DateTime as AwsDateTime},
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use std::io;
use tracing::debug;

/// Service error codes that mean our credentials were rejected.
const AUTH_ERROR_CODES: [&str; 5] = [
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "InvalidToken",
    "ExpiredToken",
    "AuthorizationHeaderMalformed",
];

#[derive(Clone, Debug)]
pub struct S3Service {
    client: Client,
    endpoint: String,
}

impl S3Service {
    /// Build an SDK client for `cfg`. No request is sent yet.
    pub async fn new(cfg: &EndpointConfig) -> Self {
        let endpoint = cfg.endpoint_url();
        let credentials = Credentials::new(
            cfg.access_key.clone(),
            cfg.secret_key.clone(),
            None,
            None,
            "object-store-client",
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&endpoint)
            .load()
            .await;
        let conf = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        debug!("configured S3 transport for {}", endpoint);
        Self {
            client: Client::from_conf(conf),
            endpoint,
        }
    }

    /// Sort an SDK failure into `Connection` or `Store`.
    fn classify<E>(&self, op: &'static str, err: SdkError<E, HttpResponse>) -> ClientError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        let status = http_status(&err);
        let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);
        let message = DisplayErrorContext(&err).to_string();

        let unreachable = matches!(
            err,
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)
        );
        // HEAD replies carry no body, so a bare 401/403 is all we get there.
        let rejected = match code.as_deref() {
            Some(code) => AUTH_ERROR_CODES.contains(&code),
            None => matches!(status, Some(401 | 403)),
        };

        if unreachable || rejected {
            ClientError::Connection {
                endpoint: self.endpoint.clone(),
                message,
            }
        } else {
            ClientError::store(op, message)
        }
    }
}

fn http_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|raw| raw.status().as_u16())
}

fn object_label(bucket: &str, key: &str) -> String {
    format!("object `{key}` in bucket `{bucket}`")
}

/// Base64 MD5 digest for the `Content-MD5` header.
fn content_md5(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(md5::compute(data).0)
}

fn to_chrono(ts: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl Backend for S3Service {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn bucket_exists(&self, bucket: &str) -> ClientResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) if http_status(&err) == Some(404) => Ok(false),
            Err(err) => Err(self.classify("HeadBucket", err)),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> ClientResult<()> {
        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err.as_service_error().is_some_and(|e| {
                    e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                }) =>
            {
                debug!("bucket {} appeared before create; treating as created", bucket);
                Ok(())
            }
            Err(err) => Err(self.classify("CreateBucket", err)),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        options: &PutOptions,
    ) -> ClientResult<Option<String>> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(options.content_type.clone());
        for (name, value) in options.metadata.iter() {
            request = request.metadata(name, value);
        }

        let request = match body {
            ObjectBody::Bytes(data) => request
                .content_md5(content_md5(&data))
                .body(ByteStream::from(data)),
            ObjectBody::File(path) => {
                let stream = ByteStream::from_path(&path)
                    .await
                    .map_err(|err| ClientError::local_io(&path, io::Error::other(err)))?;
                request.body(stream)
            }
        };

        let output = request
            .send()
            .await
            .map_err(|err| self.classify("PutObject", err))?;
        Ok(output.e_tag().map(clean_etag))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectReader> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key())
                    || http_status(&err) == Some(404)
                {
                    ClientError::not_found(object_label(bucket, key))
                } else {
                    self.classify("GetObject", err)
                }
            })?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectStat> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found())
                    || http_status(&err) == Some(404)
                {
                    ClientError::not_found(object_label(bucket, key))
                } else {
                    self.classify("HeadObject", err)
                }
            })?;

        let metadata: Metadata = output
            .metadata()
            .map(|m| m.iter().collect())
            .unwrap_or_default();

        Ok(ObjectStat {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified: output.last_modified().and_then(to_chrono),
            etag: output.e_tag().map(clean_etag),
            content_type: output.content_type().map(str::to_string),
            metadata,
        })
    }

    async fn list_page(&self, bucket: &str, request: &ListRequest) -> ClientResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.continuation_token.clone())
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_bucket()) {
                    ClientError::not_found(format!("bucket `{bucket}`"))
                } else {
                    self.classify("ListObjectsV2", err)
                }
            })?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(ObjectSummary {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified().and_then(to_chrono),
                    etag: object.e_tag().map(clean_etag),
                    is_dir: false,
                })
            })
            .collect();
        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            next_token,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        match self.client.delete_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(()),
            // S3 answers 204 for missing keys; some compatible stores say 404.
            Err(err) if http_status(&err) == Some(404) => Ok(()),
            Err(err) => Err(self.classify("DeleteObject", err)),
        }
    }
}
