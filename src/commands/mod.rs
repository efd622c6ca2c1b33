//! Command-line surface. Each subcommand sequences a few client operations
//! and prints the outcome; none of them holds logic the library lacks.

mod multi;
mod objects;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use object_store_client::{ObjectStoreClient, config::ConnectionArgs};
use std::path::PathBuf;

pub use multi::MultiArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Client for S3-compatible object stores")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload to / download from every server of a servers file
    Multi(MultiArgs),

    #[command(flatten)]
    Object(ObjectCommand),
}

/// Subcommands that work against the single configured endpoint.
#[derive(Subcommand, Debug)]
pub enum ObjectCommand {
    /// Create the configured bucket if it does not exist yet
    CreateBucket,

    /// Upload a local file
    Upload {
        file: PathBuf,
        /// Object key (defaults to the file name)
        #[arg(long, short = 'k')]
        key: Option<String>,
    },

    /// Upload a string as an object
    PutData { key: String, text: String },

    /// List objects as a table
    List {
        #[arg(long, short = 'p', default_value = "")]
        prefix: String,
        /// Show one level of the folder hierarchy only
        #[arg(long)]
        no_recursive: bool,
    },

    /// Download an object to a local file
    Download {
        key: String,
        /// Destination path (defaults to the key)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print an object's contents
    Cat { key: String },

    /// Create an empty folder marker
    Mkdir { key: String },

    /// Build a sample folder hierarchy and list it level by level
    Folders {
        /// Where the sample files are written
        #[arg(long, default_value = "demo_files")]
        workdir: PathBuf,
    },

    /// Show size, ETag and metadata of an object
    Stat { key: String },

    /// Upload a file with custom metadata
    PutMeta {
        file: PathBuf,
        #[arg(long, short = 'k')]
        key: Option<String>,
        /// Metadata entry, repeatable
        #[arg(
            long = "meta",
            short = 'm',
            value_name = "KEY=VALUE",
            value_parser = objects::parse_meta_pair
        )]
        meta: Vec<(String, String)>,
    },

    /// Delete an object (succeeds if it is already gone)
    Delete { key: String },

    /// Restore a lost local file from its stored copy
    Recover {
        key: String,
        /// Where the file originally lived; restored there as well
        #[arg(long)]
        original: Option<PathBuf>,
        #[arg(long, default_value = "demo_files/recovery")]
        recovery_dir: PathBuf,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Command::Multi(args) => return multi::run(args).await,
        Command::Object(command) => command,
    };

    let cfg = cli
        .connection
        .resolve()
        .context("resolving connection settings")?;
    tracing::debug!("connecting with {:?}", cfg);
    let client = ObjectStoreClient::connect(&cfg)
        .await
        .with_context(|| format!("connecting to {}", cfg.endpoint))?;

    match command {
        ObjectCommand::CreateBucket => objects::create_bucket(&client).await,
        ObjectCommand::Upload { file, key } => {
            objects::upload(&client, &file, key.as_deref()).await
        }
        ObjectCommand::PutData { key, text } => objects::put_data(&client, &key, text).await,
        ObjectCommand::List {
            prefix,
            no_recursive,
        } => objects::list(&client, &prefix, !no_recursive).await,
        ObjectCommand::Download { key, output } => {
            objects::download(&client, &key, output.as_deref()).await
        }
        ObjectCommand::Cat { key } => objects::cat(&client, &key).await,
        ObjectCommand::Mkdir { key } => objects::mkdir(&client, &key).await,
        ObjectCommand::Folders { workdir } => objects::folders(&client, &workdir).await,
        ObjectCommand::Stat { key } => objects::stat(&client, &key).await,
        ObjectCommand::PutMeta { file, key, meta } => {
            objects::put_meta(&client, &file, key.as_deref(), meta).await
        }
        ObjectCommand::Delete { key } => objects::delete(&client, &key).await,
        ObjectCommand::Recover {
            key,
            original,
            recovery_dir,
        } => objects::recover(&client, &key, original.as_deref(), &recovery_dir).await,
    }
}
