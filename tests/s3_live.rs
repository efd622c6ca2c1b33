//! Tests against a real S3-compatible server (MinIO, RustStack, ...).
//!
//! Everything except the unreachable-endpoint check is `#[ignore]`d. Run with:
//! ```text
//! S3_ENDPOINT_URL=http://localhost:9000 cargo test --test s3_live -- --ignored
//! ```

use futures::TryStreamExt;
use object_store_client::{
    ClientError, Metadata, ObjectStoreClient,
    config::{EndpointConfig, PartialEndpoint},
};
use std::sync::Once;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

fn endpoint_url() -> String {
    std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:9000".to_owned())
}

fn credential(var: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| "minioadmin".to_owned())
}

fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

fn live_config(bucket: &str) -> EndpointConfig {
    init_tracing();
    PartialEndpoint {
        endpoint: Some(endpoint_url()),
        access_key: Some(credential("S3_ACCESS_KEY")),
        secret_key: Some(credential("S3_SECRET_KEY")),
        bucket_name: Some(bucket.to_owned()),
        ..Default::default()
    }
    .finish()
    .expect("live config")
}

async fn live_client(prefix: &str) -> ObjectStoreClient {
    ObjectStoreClient::connect(&live_config(&test_bucket_name(prefix)))
        .await
        .expect("connect")
}

#[tokio::test]
async fn unreachable_endpoint_is_a_connection_error() {
    init_tracing();
    let cfg = PartialEndpoint {
        endpoint: Some("127.0.0.1:1".to_owned()),
        access_key: Some("minioadmin".to_owned()),
        secret_key: Some("minioadmin".to_owned()),
        bucket_name: Some("never-created".to_owned()),
        ..Default::default()
    }
    .finish()
    .unwrap();

    let err = ObjectStoreClient::connect(&cfg).await.unwrap_err();
    assert!(matches!(err, ClientError::Connection { .. }), "unexpected error: {err}");
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_should_round_trip_bytes_and_delete() {
    let client = live_client("roundtrip").await;

    client.put_bytes(b"hello, object store".to_vec(), "greeting.txt").await.unwrap();
    client.put_bytes(Vec::new(), "empty.txt").await.unwrap();

    assert_eq!(&client.get_bytes("greeting.txt").await.unwrap()[..], b"hello, object store");
    assert!(client.get_bytes("empty.txt").await.unwrap().is_empty());
    let stat = client.stat("greeting.txt").await.unwrap();
    assert_eq!(stat.size, 19);
    assert!(stat.etag.as_deref().is_some_and(|e| !e.starts_with('"')));

    client.delete("greeting.txt").await.unwrap();
    assert!(client.stat("greeting.txt").await.unwrap_err().is_not_found());
    client.delete("greeting.txt").await.unwrap();
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_should_list_with_folder_emulation() {
    let client = live_client("folders").await;
    for key in ["a.txt", "f/b.txt", "f/g/c.txt"] {
        client.put_bytes(b"x".to_vec(), key).await.unwrap();
    }

    let all: Vec<String> = client
        .list("", true)
        .map_ok(|e| e.key)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(all, vec!["a.txt", "f/b.txt", "f/g/c.txt"]);

    let shallow = client.list_all("f/", false).await.unwrap();
    let shape: Vec<_> = shallow.iter().map(|e| (e.key.as_str(), e.is_dir)).collect();
    assert_eq!(shape, vec![("f/b.txt", false), ("f/g/", true)]);
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_should_replace_metadata() {
    let client = live_client("metadata").await;

    let first: Metadata = [("Version", "1.0"), ("Author", "ops")].into_iter().collect();
    client.put_with_metadata(b"v1".to_vec(), "doc.txt", first).await.unwrap();
    let second: Metadata = [("version", "2.0")].into_iter().collect();
    client.put_with_metadata(b"v2".to_vec(), "doc.txt", second).await.unwrap();

    let stat = client.stat("doc.txt").await.unwrap();
    assert_eq!(stat.metadata.get("version"), Some("2.0"));
    assert_eq!(stat.metadata.get("author"), None);
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_should_accept_existing_bucket() {
    let cfg = live_config(&test_bucket_name("idem"));
    let first = ObjectStoreClient::connect(&cfg).await.unwrap();
    first.ensure_bucket().await.unwrap();
    ObjectStoreClient::connect(&cfg).await.unwrap();
}

#[tokio::test]
#[ignore = "requires running server"]
async fn test_should_reject_bad_credentials() {
    init_tracing();
    let cfg = PartialEndpoint {
        endpoint: Some(endpoint_url()),
        access_key: Some("not-a-user".to_owned()),
        secret_key: Some("not-a-secret".to_owned()),
        bucket_name: Some(test_bucket_name("auth")),
        ..Default::default()
    }
    .finish()
    .unwrap();

    let err = ObjectStoreClient::connect(&cfg).await.unwrap_err();
    assert!(matches!(err, ClientError::Connection { .. }), "unexpected error: {err}");
}
