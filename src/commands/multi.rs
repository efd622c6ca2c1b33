//! Fan-out over every server named in a servers file.
//!
//! Servers are independent: one failing to connect or to transfer never stops
//! the others, and the summary reports each one separately.

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use futures::future::join_all;
use object_store_client::{ClientResult, ObjectStoreClient, config};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{error, info};

#[derive(Args, Debug)]
pub struct MultiArgs {
    /// Servers file with one section per endpoint
    #[arg(long)]
    pub servers: PathBuf,

    #[arg(long, short = 'a', value_enum, default_value_t = Action::Both)]
    pub action: Action,

    /// Local file to upload
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Object key (defaults to the file name)
    #[arg(long, short = 'o')]
    pub object: Option<String>,

    /// Where downloads are written
    #[arg(long, short = 'd')]
    pub output_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Upload,
    Download,
    Both,
}

pub async fn run(args: MultiArgs) -> Result<()> {
    let servers = config::load_servers(&args.servers)
        .with_context(|| format!("reading servers file {}", args.servers.display()))?;
    let clients = connect_all(servers).await;
    if clients.is_empty() {
        bail!("no server could be reached");
    }

    let object = match (&args.object, &args.file) {
        (Some(object), _) => object.clone(),
        (None, Some(file)) => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("file path has no file name")?,
        (None, None) => bail!("either --file or --object is required"),
    };

    if matches!(args.action, Action::Upload | Action::Both) {
        let file = args
            .file
            .as_deref()
            .context("--file is required for uploads")?;
        let results = upload_to_all(&clients, file, &object).await;
        print_summary("Uploaded to", &results);
    }

    if matches!(args.action, Action::Download | Action::Both) {
        let results = download_from_all(&clients, &object, args.output_dir.as_deref()).await?;
        print_summary("Downloaded from", &results);
    }
    Ok(())
}

/// Connect to every server concurrently. Servers that fail are logged and
/// left out.
pub async fn connect_all(
    servers: BTreeMap<String, config::EndpointConfig>,
) -> BTreeMap<String, ObjectStoreClient> {
    let attempts = servers.into_iter().map(|(name, cfg)| async move {
        let outcome = ObjectStoreClient::connect(&cfg).await;
        (name, outcome)
    });

    let mut clients = BTreeMap::new();
    for (name, outcome) in join_all(attempts).await {
        match outcome {
            Ok(client) => {
                info!("connected to server '{}' at {}", name, client.endpoint());
                clients.insert(name, client);
            }
            Err(err) => error!("failed to connect to server '{}': {}", name, err),
        }
    }
    clients
}

pub async fn upload_to_all(
    clients: &BTreeMap<String, ObjectStoreClient>,
    file: &Path,
    object: &str,
) -> BTreeMap<String, ClientResult<String>> {
    let uploads = clients.iter().map(|(name, client)| async move {
        let outcome = client.put_file(file, Some(object)).await;
        match &outcome {
            Ok(_) => info!("uploaded '{}' to server '{}'", object, name),
            Err(err) => error!("upload to server '{}' failed: {}", name, err),
        }
        (name.clone(), outcome)
    });
    join_all(uploads).await.into_iter().collect()
}

/// Download `object` from every server into `<server>_<object>` files.
pub async fn download_from_all(
    clients: &BTreeMap<String, ObjectStoreClient>,
    object: &str,
    output_dir: Option<&Path>,
) -> Result<BTreeMap<String, ClientResult<PathBuf>>> {
    if let Some(dir) = output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let downloads = clients.iter().map(|(name, client)| async move {
        let target = download_path(name, object, output_dir);
        let outcome = client.get_to_file(object, Some(&target)).await;
        match &outcome {
            Ok(path) => info!(
                "downloaded '{}' from server '{}' to {}",
                object,
                name,
                path.display()
            ),
            Err(err) => error!("download from server '{}' failed: {}", name, err),
        }
        (name.clone(), outcome)
    });
    Ok(join_all(downloads).await.into_iter().collect())
}

fn download_path(server: &str, object: &str, output_dir: Option<&Path>) -> PathBuf {
    let flat = object.replace('/', "_");
    let name = format!("{server}_{flat}");
    match output_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn print_summary<T>(verb: &str, results: &BTreeMap<String, ClientResult<T>>) {
    let succeeded = results.values().filter(|r| r.is_ok()).count();
    println!("\n{verb} {succeeded} out of {} servers", results.len());
    for (name, outcome) in results {
        match outcome {
            Ok(_) => println!("  {name}: Success"),
            Err(err) => println!("  {name}: Failed ({err})"),
        }
    }
}
