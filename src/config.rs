use crate::errors::{ClientError, ClientResult};
use clap::Args;
use serde::Deserialize;
use std::{collections::BTreeMap, env, fmt, path::Path, path::PathBuf};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SECTION: &str = "minio";

/// Where and how to reach one store. Immutable once a client is built from it.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// `host:port`, a full `http(s)://` URL, or `file://<dir>` for the local backend.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Use TLS when `endpoint` carries no scheme.
    pub secure: bool,
    pub region: String,
    /// Default bucket for every operation of the client.
    pub bucket_name: String,
}

impl EndpointConfig {
    /// Root directory when the endpoint selects the local backend.
    pub fn local_root(&self) -> Option<PathBuf> {
        self.endpoint.strip_prefix("file://").map(PathBuf::from)
    }

    /// Endpoint as a URL the S3 transport understands.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            let scheme = if self.secure { "https" } else { "http" };
            format!("{scheme}://{}", self.endpoint)
        }
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("secure", &self.secure)
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

/// One section of a config file, or one layer of overrides. Every field is
/// optional until [`PartialEndpoint::finish`] checks the merged result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialEndpoint {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub secure: Option<bool>,
    pub region: Option<String>,
    pub bucket_name: Option<String>,
}

impl PartialEndpoint {
    /// Values set in `other` win.
    pub fn overlay(self, other: PartialEndpoint) -> Self {
        Self {
            endpoint: other.endpoint.or(self.endpoint),
            access_key: other.access_key.or(self.access_key),
            secret_key: other.secret_key.or(self.secret_key),
            secure: other.secure.or(self.secure),
            region: other.region.or(self.region),
            bucket_name: other.bucket_name.or(self.bucket_name),
        }
    }

    /// Read `OBJECT_STORE_*` variables.
    pub fn from_env() -> ClientResult<Self> {
        let secure = match env::var("OBJECT_STORE_SECURE") {
            Ok(value) => Some(parse_bool(&value).ok_or_else(|| {
                ClientError::Config(format!("OBJECT_STORE_SECURE value `{value}` is not a boolean"))
            })?),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(ClientError::Config(format!("OBJECT_STORE_SECURE: {err}"))),
        };

        Ok(Self {
            endpoint: env::var("OBJECT_STORE_ENDPOINT").ok(),
            access_key: env::var("OBJECT_STORE_ACCESS_KEY").ok(),
            secret_key: env::var("OBJECT_STORE_SECRET_KEY").ok(),
            secure,
            region: env::var("OBJECT_STORE_REGION").ok(),
            bucket_name: env::var("OBJECT_STORE_BUCKET").ok(),
        })
    }

    pub fn finish(self) -> ClientResult<EndpointConfig> {
        let endpoint = required(self.endpoint, "endpoint")?;
        let bucket_name = required(self.bucket_name, "bucket_name")?;
        let local = endpoint.starts_with("file://");
        let (access_key, secret_key) = if local {
            (
                self.access_key.unwrap_or_default(),
                self.secret_key.unwrap_or_default(),
            )
        } else {
            (
                required(self.access_key, "access_key")?,
                required(self.secret_key, "secret_key")?,
            )
        };

        Ok(EndpointConfig {
            endpoint,
            access_key,
            secret_key,
            secure: self.secure.unwrap_or(false),
            region: self
                .region
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket_name,
        })
    }
}

fn required(value: Option<String>, field: &str) -> ClientResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ClientError::Config(format!("missing `{field}`")))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_file(path: &Path) -> ClientResult<::config::Config> {
    if !path.exists() {
        return Err(ClientError::Config(format!(
            "config file {} not found",
            path.display()
        )));
    }
    ::config::Config::builder()
        .add_source(::config::File::from(path))
        .build()
        .map_err(|err| ClientError::Config(format!("reading {}: {err}", path.display())))
}

/// Read one named section of an INI/TOML/... file.
pub fn load_section(path: &Path, section: &str) -> ClientResult<PartialEndpoint> {
    read_file(path)?
        .get::<PartialEndpoint>(section)
        .map_err(|err| {
            ClientError::Config(format!("section `{section}` in {}: {err}", path.display()))
        })
}

/// Read every section of a servers file as a named endpoint.
pub fn load_servers(path: &Path) -> ClientResult<BTreeMap<String, EndpointConfig>> {
    let sections: BTreeMap<String, PartialEndpoint> = read_file(path)?
        .try_deserialize()
        .map_err(|err| ClientError::Config(format!("parsing {}: {err}", path.display())))?;

    sections
        .into_iter()
        .map(|(name, partial)| match partial.finish() {
            Ok(cfg) => Ok((name, cfg)),
            Err(err) => Err(ClientError::Config(format!("section `{name}`: {err}"))),
        })
        .collect()
}

/// Connection flags shared by every CLI subcommand.
///
/// Precedence, lowest first: config file section, `OBJECT_STORE_*`
/// environment variables, then these flags.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Config file holding a section with endpoint settings
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Section of the config file to read
    #[arg(long, global = true, default_value = DEFAULT_SECTION)]
    pub section: String,

    /// Endpoint as host:port, URL, or file://<dir> (overrides OBJECT_STORE_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Access key (overrides OBJECT_STORE_ACCESS_KEY)
    #[arg(long, global = true)]
    pub access_key: Option<String>,

    /// Secret key (overrides OBJECT_STORE_SECRET_KEY)
    #[arg(long, global = true)]
    pub secret_key: Option<String>,

    /// Use https for host:port endpoints (overrides OBJECT_STORE_SECURE)
    #[arg(long, global = true)]
    pub secure: bool,

    /// Region (overrides OBJECT_STORE_REGION)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Bucket name (overrides OBJECT_STORE_BUCKET)
    #[arg(long, short = 'b', global = true)]
    pub bucket: Option<String>,
}

impl ConnectionArgs {
    pub fn resolve(&self) -> ClientResult<EndpointConfig> {
        let from_file = match &self.config {
            Some(path) => load_section(path, &self.section)?,
            None => PartialEndpoint::default(),
        };
        let from_args = PartialEndpoint {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            secure: self.secure.then_some(true),
            region: self.region.clone(),
            bucket_name: self.bucket.clone(),
        };

        from_file
            .overlay(PartialEndpoint::from_env()?)
            .overlay(from_args)
            .finish()
    }
}
