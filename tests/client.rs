use futures::TryStreamExt;
use object_store_client::{
    ClientError, Metadata, ObjectStoreClient,
    config::{EndpointConfig, PartialEndpoint},
    services::storage_service::StorageService,
};
use std::sync::Arc;
use tempfile::TempDir;

fn local_config(root: &TempDir, bucket: &str) -> EndpointConfig {
    PartialEndpoint {
        endpoint: Some(format!("file://{}", root.path().display())),
        bucket_name: Some(bucket.to_string()),
        ..Default::default()
    }
    .finish()
    .unwrap()
}

async fn local_client() -> (TempDir, ObjectStoreClient) {
    let root = TempDir::new().unwrap();
    let client = ObjectStoreClient::connect(&local_config(&root, "test-bucket"))
        .await
        .unwrap();
    (root, client)
}

fn keys(entries: &[object_store_client::ObjectSummary]) -> Vec<&str> {
    entries.iter().map(|e| e.key.as_str()).collect()
}

#[tokio::test]
async fn bytes_round_trip_including_empty_payloads() {
    let (_root, client) = local_client().await;

    client.put_bytes(b"hello world".to_vec(), "greetings/hello.txt").await.unwrap();
    client.put_bytes(Vec::new(), "empty.bin").await.unwrap();

    assert_eq!(&client.get_bytes("greetings/hello.txt").await.unwrap()[..], b"hello world");
    assert!(client.get_bytes("empty.bin").await.unwrap().is_empty());

    let stat = client.stat("greetings/hello.txt").await.unwrap();
    assert_eq!(stat.size, 11);
    assert_eq!(stat.etag.as_deref(), Some("5eb63bbbe01eeed093cb22bb8f5acdc3"));
    assert!(stat.last_modified.is_some());
}

#[tokio::test]
async fn overwrite_replaces_payload() {
    let (_root, client) = local_client().await;

    client.put_bytes(b"first".to_vec(), "doc.txt").await.unwrap();
    client.put_bytes(b"second version".to_vec(), "doc.txt").await.unwrap();

    assert_eq!(&client.get_bytes("doc.txt").await.unwrap()[..], b"second version");
    assert_eq!(client.list_all("", true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (_root, client) = local_client().await;
    client.put_bytes(b"bye".to_vec(), "gone.txt").await.unwrap();

    client.delete("gone.txt").await.unwrap();
    let err = client.stat("gone.txt").await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(!client.exists("gone.txt").await.unwrap());

    client.delete("gone.txt").await.unwrap();
    client.delete("never-existed.txt").await.unwrap();
}

#[tokio::test]
async fn recursive_listing_returns_every_key_in_order() {
    let (_root, client) = local_client().await;
    for key in ["f/g/c.txt", "a.txt", "f/b.txt"] {
        client.put_bytes(key.as_bytes().to_vec(), key).await.unwrap();
    }

    let entries = client.list_all("", true).await.unwrap();
    assert_eq!(keys(&entries), vec!["a.txt", "f/b.txt", "f/g/c.txt"]);
    assert!(entries.iter().all(|e| !e.is_dir));
    assert_eq!(entries[0].size, 5);
}

#[tokio::test]
async fn shallow_listing_folds_subfolders() {
    let (_root, client) = local_client().await;
    for key in ["a.txt", "f/b.txt", "f/g/c.txt", "f/g/d.txt"] {
        client.put_bytes(b"x".to_vec(), key).await.unwrap();
    }

    let entries = client.list_all("f/", false).await.unwrap();
    let shape: Vec<_> = entries.iter().map(|e| (e.key.as_str(), e.is_dir)).collect();
    assert_eq!(shape, vec![("f/b.txt", false), ("f/g/", true)]);

    let root = client.list_all("", false).await.unwrap();
    let shape: Vec<_> = root.iter().map(|e| (e.key.as_str(), e.is_dir)).collect();
    assert_eq!(shape, vec![("a.txt", false), ("f/", true)]);
}

#[tokio::test]
async fn folder_markers_show_up_as_entries() {
    let (_root, client) = local_client().await;

    assert_eq!(client.create_folder("folder1").await.unwrap(), "folder1/");
    client.create_folder("folder1/subfolder/").await.unwrap();
    client.put_bytes(b"data".to_vec(), "folder1/file.txt").await.unwrap();

    let stat = client.stat("folder1/").await.unwrap();
    assert_eq!(stat.size, 0);

    let entries = client.list_all("folder1/", false).await.unwrap();
    assert_eq!(keys(&entries), vec!["folder1/", "folder1/file.txt", "folder1/subfolder/"]);
}

#[tokio::test]
async fn non_empty_folder_marker_is_rejected() {
    let (_root, client) = local_client().await;

    let err = client.put_bytes(b"oops".to_vec(), "dir/").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidKey { .. }), "unexpected error: {err}");
    assert!(!client.exists("dir/").await.unwrap());

    let err = client.put_bytes(b"x".to_vec(), "").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidKey { .. }));
}

#[tokio::test]
async fn metadata_is_replaced_not_merged() {
    let (root, client) = local_client().await;
    let file = root.path().join("sample.txt");
    tokio::fs::write(&file, b"versioned").await.unwrap();

    let first: Metadata = [("Version", "1.0"), ("Author", "ops")].into_iter().collect();
    client.put_with_metadata(file.as_path(), "sample.txt", first).await.unwrap();
    let stat = client.stat("sample.txt").await.unwrap();
    assert_eq!(stat.metadata.get("version"), Some("1.0"));
    assert_eq!(stat.metadata.get("author"), Some("ops"));

    let second: Metadata = [("version", "2.0")].into_iter().collect();
    client.put_with_metadata(file.as_path(), "sample.txt", second).await.unwrap();
    let stat = client.stat("sample.txt").await.unwrap();
    assert_eq!(stat.metadata.get("version"), Some("2.0"));
    assert_eq!(stat.metadata.get("author"), None);
    assert_eq!(stat.metadata.len(), 1);
}

#[tokio::test]
async fn metadata_keys_are_normalized() {
    let (_root, client) = local_client().await;

    let metadata: Metadata = [("X-Amz-Meta-Project", " demo "), ("  Owner ", "team")]
        .into_iter()
        .collect();
    client
        .put_with_metadata(b"payload".to_vec(), "meta.txt", metadata)
        .await
        .unwrap();

    let stat = client.stat("meta.txt").await.unwrap();
    let names: Vec<_> = stat.metadata.iter().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["owner", "project"]);
    assert_eq!(stat.metadata.get("Project"), Some(" demo "));
}

#[tokio::test]
async fn ensure_bucket_is_idempotent() {
    let root = TempDir::new().unwrap();
    let cfg = local_config(&root, "twice-bucket");

    let first = ObjectStoreClient::connect(&cfg).await.unwrap();
    first.ensure_bucket().await.unwrap();
    first.put_bytes(b"kept".to_vec(), "kept.txt").await.unwrap();
    drop(first);

    let second = ObjectStoreClient::connect(&cfg).await.unwrap();
    assert_eq!(&second.get_bytes("kept.txt").await.unwrap()[..], b"kept");
}

#[tokio::test]
async fn invalid_bucket_name_fails_at_connect() {
    let root = TempDir::new().unwrap();
    let err = ObjectStoreClient::connect(&local_config(&root, "Bad_Bucket"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Config(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn download_creates_parent_directories() {
    let (root, client) = local_client().await;
    client.put_bytes(b"nested".to_vec(), "docs/report.txt").await.unwrap();

    let target = root.path().join("out/deep/tree/report.txt");
    let written = client.get_to_file("docs/report.txt", Some(&target)).await.unwrap();
    assert_eq!(written, target);
    assert_eq!(tokio::fs::read(&target).await.unwrap(), b"nested");
}

#[tokio::test]
async fn missing_object_download_leaves_no_file() {
    let (root, client) = local_client().await;
    let target = root.path().join("downloads/missing.txt");

    let err = client.get_to_file("missing.txt", Some(&target)).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(!target.exists());
}

#[tokio::test]
async fn put_file_defaults_key_to_base_name() {
    let (root, client) = local_client().await;
    let file = root.path().join("upload_me.txt");
    tokio::fs::write(&file, b"from disk").await.unwrap();

    let key = client.put_file(&file, None).await.unwrap();
    assert_eq!(key, "upload_me.txt");
    assert_eq!(&client.get_bytes("upload_me.txt").await.unwrap()[..], b"from disk");

    let key = client.put_file(&file, Some("archive/copy.txt")).await.unwrap();
    assert_eq!(key, "archive/copy.txt");
}

#[tokio::test]
async fn put_file_of_missing_path_is_not_found() {
    let (root, client) = local_client().await;

    let err = client
        .put_file(root.path().join("nope.txt"), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    let err = client.put_file(root.path(), Some("dir.txt")).await.unwrap_err();
    assert!(matches!(err, ClientError::LocalIo { .. }), "unexpected error: {err}");
}

#[tokio::test]
async fn listing_spans_multiple_pages() {
    let (_root, client) = local_client().await;
    let expected: Vec<String> = (0..1010).map(|i| format!("bulk/item-{i:05}.txt")).collect();
    for key in &expected {
        client.put_bytes(Vec::new(), key).await.unwrap();
    }

    let listed: Vec<String> = client
        .list("bulk/", true)
        .map_ok(|entry| entry.key)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn listing_with_no_matches_is_empty() {
    let (_root, client) = local_client().await;
    client.put_bytes(b"x".to_vec(), "present.txt").await.unwrap();

    assert!(client.list_all("absent/", true).await.unwrap().is_empty());
    assert!(client.list_all("absent/", false).await.unwrap().is_empty());
}

#[tokio::test]
async fn clients_share_a_backend() {
    let root = TempDir::new().unwrap();
    let backend = Arc::new(StorageService::open(root.path()).await.unwrap());

    let left = ObjectStoreClient::with_backend("left-bucket", backend.clone()).await.unwrap();
    let right = ObjectStoreClient::with_backend("right-bucket", backend).await.unwrap();

    left.put_bytes(b"left".to_vec(), "same-key").await.unwrap();
    right.put_bytes(b"right".to_vec(), "same-key").await.unwrap();

    assert_eq!(&left.get_bytes("same-key").await.unwrap()[..], b"left");
    assert_eq!(&right.get_bytes("same-key").await.unwrap()[..], b"right");
    assert_eq!(left.bucket(), "left-bucket");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overwrites_keep_stat_and_payload_in_agreement() {
    let (_root, client) = local_client().await;

    for round in 0..10usize {
        let writers: Vec<_> = (0..8usize)
            .map(|i| {
                let client = client.clone();
                let payload = vec![b'a' + i as u8; 1 + i * 1000 + round];
                tokio::spawn(async move { client.put_bytes(payload, "hot.txt").await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let stat = client.stat("hot.txt").await.unwrap();
        let data = client.get_bytes("hot.txt").await.unwrap();
        assert_eq!(stat.size as usize, data.len(), "round {round}");
        assert_eq!(
            stat.etag.as_deref(),
            Some(format!("{:x}", md5::compute(&data)).as_str()),
            "round {round}"
        );
    }
}

#[tokio::test]
async fn folder_marker_downloads_as_directory() {
    let (root, client) = local_client().await;
    client.create_folder("folderx").await.unwrap();

    let target = root.path().join("dl/folderx/");
    let written = client.get_to_file("folderx/", Some(&target)).await.unwrap();
    assert_eq!(written, target);
    assert!(target.is_dir());

    let err = client
        .get_to_file("missing/", Some(&root.path().join("dl/missing/")))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(!root.path().join("dl/missing").exists());
}
