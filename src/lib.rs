//! Opinionated client for S3-compatible object stores.
//!
//! [`ObjectStoreClient`] wraps one endpoint and one default bucket and offers
//! put/get for files and buffers, prefix listing with `/` folder emulation,
//! metadata, and idempotent delete. Endpoints are either S3-compatible
//! servers (through `aws-sdk-s3`) or a local directory (`file://<dir>`) backed
//! by SQLite and plain files.
//!
//! ```no_run
//! use futures::TryStreamExt;
//! use object_store_client::{ObjectStoreClient, config::PartialEndpoint};
//!
//! # async fn demo() -> Result<(), object_store_client::ClientError> {
//! let cfg = PartialEndpoint {
//!     endpoint: Some("localhost:9000".into()),
//!     access_key: Some("minioadmin".into()),
//!     secret_key: Some("minioadmin".into()),
//!     bucket_name: Some("demo-bucket".into()),
//!     ..Default::default()
//! }
//! .finish()?;
//!
//! let client = ObjectStoreClient::connect(&cfg).await?;
//! client.put_bytes(b"hello".to_vec(), "greetings/hello.txt").await?;
//! let entries: Vec<_> = client.list("greetings/", false).try_collect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use client::{ObjectSource, ObjectStoreClient};
pub use errors::{ClientError, ClientResult};
pub use models::{Metadata, ObjectStat, ObjectSummary};
pub use services::PutOptions;
