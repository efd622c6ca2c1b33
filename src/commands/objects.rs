//! Single-endpoint subcommands.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use chrono::{Local, SecondsFormat};
use futures::{TryStreamExt, pin_mut};
use object_store_client::{Metadata, ObjectStoreClient, ObjectSummary};
use std::path::Path;
use tokio::fs;
use tracing::info;

pub fn parse_meta_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

/// `512 B`, `1.50 KB`, `3.00 MB`, ...
pub fn human_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    let bytes = size as f64;
    if bytes < KB {
        format!("{size} B")
    } else if bytes < KB * KB {
        format!("{:.2} KB", bytes / KB)
    } else if bytes < KB * KB * KB {
        format!("{:.2} MB", bytes / (KB * KB))
    } else {
        format!("{:.2} GB", bytes / (KB * KB * KB))
    }
}

/// Render listing entries as an aligned text table.
pub fn render_table(entries: &[ObjectSummary]) -> String {
    let headers = ["Object Name", "Size", "Last Modified", "ETag"];
    let rows: Vec<[String; 4]> = entries
        .iter()
        .map(|e| {
            [
                e.key.clone(),
                if e.is_dir {
                    "<DIR>".to_string()
                } else {
                    human_size(e.size)
                },
                e.last_modified
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                e.etag.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut out = String::new();
    out.push_str(&line(&headers));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &rows {
        out.push('\n');
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&cells));
    }
    out
}

pub async fn create_bucket(client: &ObjectStoreClient) -> Result<()> {
    // `connect` already ensured it; repeating is harmless and states intent.
    client.ensure_bucket().await?;
    println!("Bucket '{}' is ready on {}", client.bucket(), client.endpoint());
    Ok(())
}

pub async fn upload(client: &ObjectStoreClient, file: &Path, key: Option<&str>) -> Result<()> {
    let key = client
        .put_file(file, key)
        .await
        .with_context(|| format!("uploading {}", file.display()))?;
    println!("'{}' successfully uploaded as '{}'", file.display(), key);
    Ok(())
}

pub async fn put_data(client: &ObjectStoreClient, key: &str, text: String) -> Result<()> {
    client.put_bytes(Bytes::from(text.into_bytes()), key).await?;
    println!("Data successfully uploaded as '{key}'");
    Ok(())
}

pub async fn list(client: &ObjectStoreClient, prefix: &str, recursive: bool) -> Result<()> {
    let entries = client.list_all(prefix, recursive).await?;
    if entries.is_empty() {
        println!("Bucket '{}' has no objects under '{}'", client.bucket(), prefix);
        return Ok(());
    }
    println!("Objects in bucket: {}", client.bucket());
    println!("{}", render_table(&entries));
    info!("found {} entries in bucket '{}'", entries.len(), client.bucket());
    Ok(())
}

pub async fn download(client: &ObjectStoreClient, key: &str, output: Option<&Path>) -> Result<()> {
    let path = client
        .get_to_file(key, output)
        .await
        .with_context(|| format!("downloading '{key}'"))?;
    println!("'{}' successfully downloaded to '{}'", key, path.display());
    Ok(())
}

pub async fn cat(client: &ObjectStoreClient, key: &str) -> Result<()> {
    let data = client.get_bytes(key).await?;
    println!("{}", String::from_utf8_lossy(&data));
    Ok(())
}

pub async fn mkdir(client: &ObjectStoreClient, key: &str) -> Result<()> {
    let marker = client.create_folder(key).await?;
    println!("Created folder marker '{marker}'");
    Ok(())
}

pub async fn folders(client: &ObjectStoreClient, workdir: &Path) -> Result<()> {
    const SAMPLES: [(&str, &str); 3] = [
        ("folder1/folder1_file.txt", "This is a file stored in folder1/"),
        (
            "folder1/subfolder/subfolder_file.txt",
            "This is a file stored in folder1/subfolder/",
        ),
        ("folder2/folder2_file.txt", "This is a file stored in folder2/"),
    ];

    for marker in ["folder1/", "folder2/", "folder1/subfolder/"] {
        client.create_folder(marker).await?;
        info!("created '{}' directory marker", marker);
    }

    let created_at = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
    for (key, text) in SAMPLES {
        let local = workdir.join(key);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&local, format!("{text}\nCreated at: {created_at}\n"))
            .await
            .with_context(|| format!("writing sample file {}", local.display()))?;
        client.put_file(&local, Some(key)).await?;
        info!("uploaded {} to {}", local.display(), key);
    }

    let levels = [
        ("Root level objects", "", false),
        ("Objects in folder1/", "folder1/", false),
        ("Objects in folder1/subfolder/", "folder1/subfolder/", false),
        ("Objects in folder2/", "folder2/", false),
        ("All objects (recursive)", "", true),
    ];
    println!("Folder structure in bucket '{}':", client.bucket());
    for (title, prefix, recursive) in levels {
        println!("\n{title}:");
        let entries = client.list(prefix, recursive);
        pin_mut!(entries);
        while let Some(entry) = entries.try_next().await? {
            println!("- {}", entry.key);
        }
    }
    Ok(())
}

pub async fn stat(client: &ObjectStoreClient, key: &str) -> Result<()> {
    let stat = client.stat(key).await?;
    println!("Object: {}", stat.key);
    println!("Size: {} bytes", stat.size);
    if let Some(ts) = stat.last_modified {
        println!("Last modified: {ts}");
    }
    if let Some(etag) = &stat.etag {
        println!("ETag: {etag}");
    }
    if let Some(content_type) = &stat.content_type {
        println!("Content type: {content_type}");
    }
    if stat.metadata.is_empty() {
        println!("No custom metadata");
    } else {
        println!("Custom metadata:");
        for (name, value) in stat.metadata.iter() {
            println!("- {name}: {value}");
        }
    }
    Ok(())
}

pub async fn put_meta(
    client: &ObjectStoreClient,
    file: &Path,
    key: Option<&str>,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let key = match key {
        Some(key) => key.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("file path has no file name")?,
    };
    let metadata: Metadata = meta.into_iter().collect();
    client.put_with_metadata(file, &key, metadata).await?;
    println!("Uploaded '{}' as '{}' with metadata", file.display(), key);
    stat(client, &key).await
}

pub async fn delete(client: &ObjectStoreClient, key: &str) -> Result<()> {
    client.delete(key).await?;
    println!("'{key}' successfully deleted");
    Ok(())
}

/// Download `key` into `recovery_dir` and, when `original` is given, put a
/// copy back at the original location too.
pub async fn recover(
    client: &ObjectStoreClient,
    key: &str,
    original: Option<&Path>,
    recovery_dir: &Path,
) -> Result<()> {
    if !client.exists(key).await? {
        bail!("could not find '{}' in bucket '{}'", key, client.bucket());
    }
    info!("object '{}' found in bucket '{}'", key, client.bucket());

    let file_name = Path::new(key)
        .file_name()
        .context("object key has no file name component")?;
    let recovery_path = recovery_dir.join(file_name);
    client.get_to_file(key, Some(&recovery_path)).await?;
    let size = fs::metadata(&recovery_path).await?.len();
    println!("File recovered to {} ({} bytes)", recovery_path.display(), size);

    if let Some(original) = original {
        if let Some(parent) = original.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&recovery_path, original)
            .await
            .with_context(|| format!("restoring {}", original.display()))?;
        println!("Also restored to original location: {}", original.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use object_store_client::config::PartialEndpoint;
    use tempfile::TempDir;

    async fn local_client(root: &Path) -> ObjectStoreClient {
        let cfg = PartialEndpoint {
            endpoint: Some(format!("file://{}", root.display())),
            bucket_name: Some("cli-bucket".into()),
            ..Default::default()
        }
        .finish()
        .unwrap();
        ObjectStoreClient::connect(&cfg).await.unwrap()
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(human_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn meta_pairs_need_a_key() {
        assert_eq!(
            parse_meta_pair("version=1.0"),
            Ok(("version".to_string(), "1.0".to_string()))
        );
        assert_eq!(
            parse_meta_pair("note=a=b"),
            Ok(("note".to_string(), "a=b".to_string()))
        );
        assert!(parse_meta_pair("=1.0").is_err());
        assert!(parse_meta_pair("novalue").is_err());
    }

    #[test]
    fn table_aligns_columns_and_marks_directories() {
        let entries = vec![
            ObjectSummary {
                key: "a.txt".into(),
                size: 2048,
                last_modified: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
                etag: Some("abc".into()),
                is_dir: false,
            },
            ObjectSummary::directory("folder1/"),
        ];

        let table = render_table(&entries);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Object Name | Size"));
        assert!(lines[2].contains("2.00 KB"));
        assert!(lines[2].contains("2024-05-01 12:00:00"));
        assert!(lines[3].contains("<DIR>"));
        assert_eq!(lines[0].len(), lines[2].len());
    }

    #[tokio::test]
    async fn folders_uploads_the_sample_hierarchy() {
        let store = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let client = local_client(store.path()).await;

        folders(&client, work.path()).await.unwrap();

        let local = work.path().join("folder1/subfolder/subfolder_file.txt");
        let text = tokio::fs::read_to_string(&local).await.unwrap();
        assert!(text.starts_with("This is a file stored in folder1/subfolder/"));

        let all: Vec<String> = client
            .list_all("", true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(
            all,
            vec![
                "folder1/",
                "folder1/folder1_file.txt",
                "folder1/subfolder/",
                "folder1/subfolder/subfolder_file.txt",
                "folder2/",
                "folder2/folder2_file.txt",
            ]
        );

        let root = client.list_all("", false).await.unwrap();
        let shape: Vec<_> = root.iter().map(|e| (e.key.as_str(), e.is_dir)).collect();
        assert_eq!(shape, vec![("folder1/", true), ("folder2/", true)]);
    }

    #[tokio::test]
    async fn recover_restores_into_recovery_dir_and_original_path() {
        let store = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let client = local_client(store.path()).await;

        let original = work.path().join("docs/important.txt");
        tokio::fs::create_dir_all(original.parent().unwrap()).await.unwrap();
        tokio::fs::write(&original, b"keep me safe").await.unwrap();
        client
            .put_file(&original, Some("backups/important.txt"))
            .await
            .unwrap();
        tokio::fs::remove_dir_all(work.path().join("docs")).await.unwrap();

        let recovery = work.path().join("recovery");
        recover(&client, "backups/important.txt", Some(&original), &recovery)
            .await
            .unwrap();

        let recovered = tokio::fs::read(recovery.join("important.txt")).await.unwrap();
        assert_eq!(recovered, b"keep me safe");
        assert_eq!(tokio::fs::read(&original).await.unwrap(), b"keep me safe");
    }

    #[tokio::test]
    async fn recover_of_missing_object_writes_nothing() {
        let store = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let client = local_client(store.path()).await;

        let recovery = work.path().join("recovery");
        let err = recover(&client, "lost.txt", None, &recovery).await.unwrap_err();
        assert!(err.to_string().contains("could not find 'lost.txt'"));
        assert!(!recovery.exists());
    }
}
