//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use crate::cache::CacheBackend;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "postkeep";
const ENV_PREFIX: &str = "POSTKEEP";
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DYNAMODB_REGION: &str = "us-west-2";
const DEFAULT_DYNAMODB_TABLE: &str = "post";
const DEFAULT_CACHE_CAPACITY: usize = 1024;
const DEFAULT_MEMCACHED_SERVER: &str = "memcache://127.0.0.1:11211";

/// Command-line arguments for the postkeep binary.
#[derive(Debug, Parser)]
#[command(
    name = "postkeep",
    version,
    about = "Store and fetch posts through a configurable backend and cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "POSTKEEP_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create a post and print it.
    Create(CreateArgs),
    /// Print a single post.
    Read(PostArgs),
    /// Print every post owned by a user.
    #[command(name = "list")]
    List(UserArgs),
    /// Replace the data of a post and print the new update time.
    Update(UpdateArgs),
    /// Delete a post; deleting a missing post succeeds.
    Delete(PostArgs),
    /// Create the table used by the configured storage backend.
    Bootstrap,
}

#[derive(Debug, Args, Clone)]
pub struct UserArgs {
    /// Owner of the posts.
    #[arg(long = "user", value_name = "USER_ID")]
    pub user_id: String,
}

#[derive(Debug, Args, Clone)]
pub struct PostArgs {
    /// Owner of the post.
    #[arg(long = "user", value_name = "USER_ID")]
    pub user_id: String,

    /// Identifier of the post.
    #[arg(long = "post", value_name = "POST_ID")]
    pub post_id: String,
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    /// Owner of the new post.
    #[arg(long = "user", value_name = "USER_ID")]
    pub user_id: String,

    /// Post payload.
    #[arg(value_name = "DATA")]
    pub data: String,
}

#[derive(Debug, Args, Clone)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub post: PostArgs,

    /// Replacement payload.
    #[arg(value_name = "DATA")]
    pub data: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the storage backend (memory|postgres|dynamodb).
    #[arg(long = "storage-backend", value_name = "BACKEND", global = true)]
    pub storage_backend: Option<String>,

    /// Override the per-operation deadline in milliseconds.
    #[arg(long = "operation-timeout-ms", value_name = "MILLIS", global = true)]
    pub operation_timeout_ms: Option<u64>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT", global = true)]
    pub database_max_connections: Option<u32>,

    /// Override the DynamoDB region.
    #[arg(long = "dynamodb-region", value_name = "REGION", global = true)]
    pub dynamodb_region: Option<String>,

    /// Override the DynamoDB endpoint, e.g. a DynamoDB Local URL.
    #[arg(long = "dynamodb-endpoint-url", value_name = "URL", global = true)]
    pub dynamodb_endpoint_url: Option<String>,

    /// Override the DynamoDB table name.
    #[arg(long = "dynamodb-table", value_name = "TABLE", global = true)]
    pub dynamodb_table: Option<String>,

    /// Override the cache backend (none|memory|memcached).
    #[arg(long = "cache-backend", value_name = "BACKEND", global = true)]
    pub cache_backend: Option<String>,

    /// Override the in-process cache capacity.
    #[arg(long = "cache-capacity", value_name = "COUNT", global = true)]
    pub cache_capacity: Option<usize>,

    /// Override the memcached servers (comma separated).
    #[arg(
        long = "memcached-servers",
        value_name = "URLS",
        value_delimiter = ',',
        global = true
    )]
    pub memcached_servers: Option<Vec<String>>,

    /// Override the memcached entry expiry in seconds.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS", global = true)]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

/// Which [`PostStore`](crate::application::repos::PostStore) to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
    DynamoDb,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
            Self::DynamoDb => "dynamodb",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "dynamodb" | "dynamo" => Ok(Self::DynamoDb),
            other => Err(format!(
                "unknown storage backend `{other}` (expected memory|postgres|dynamodb)"
            )),
        }
    }
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub postgres: PostgresSettings,
    pub dynamodb: DynamoDbSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub operation_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct DynamoDbSettings {
    pub region: String,
    pub endpoint_url: Option<String>,
    pub table: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub capacity: NonZeroUsize,
    pub memcached_servers: Vec<String>,
    pub ttl: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("cache.memcached_servers")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    postgres: RawPostgresSettings,
    dynamodb: RawDynamoDbSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(backend) = overrides.storage_backend.as_ref() {
            self.storage.backend = Some(backend.clone());
        }
        if let Some(timeout) = overrides.operation_timeout_ms {
            self.storage.operation_timeout_ms = Some(timeout);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.postgres.url = Some(url.clone());
        }
        if let Some(count) = overrides.database_max_connections {
            self.postgres.max_connections = Some(count);
        }
        if let Some(region) = overrides.dynamodb_region.as_ref() {
            self.dynamodb.region = Some(region.clone());
        }
        if let Some(endpoint) = overrides.dynamodb_endpoint_url.as_ref() {
            self.dynamodb.endpoint_url = Some(endpoint.clone());
        }
        if let Some(table) = overrides.dynamodb_table.as_ref() {
            self.dynamodb.table = Some(table.clone());
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(servers) = overrides.memcached_servers.as_ref() {
            self.cache.memcached_servers = Some(servers.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            logging: build_logging_settings(raw.logging)?,
            storage: build_storage_settings(raw.storage)?,
            postgres: build_postgres_settings(raw.postgres)?,
            dynamodb: build_dynamodb_settings(raw.dynamodb)?,
            cache: build_cache_settings(raw.cache)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let backend = match storage.backend {
        Some(value) => StorageBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("storage.backend", reason))?,
        None => StorageBackend::Memory,
    };

    let timeout_ms = storage
        .operation_timeout_ms
        .unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "storage.operation_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(StorageSettings {
        backend,
        operation_timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_postgres_settings(postgres: RawPostgresSettings) -> Result<PostgresSettings, LoadError> {
    let url = non_blank(postgres.url);
    let max_connections = non_zero_u32(
        postgres
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "postgres.max_connections",
    )?;

    Ok(PostgresSettings {
        url,
        max_connections,
    })
}

fn build_dynamodb_settings(dynamodb: RawDynamoDbSettings) -> Result<DynamoDbSettings, LoadError> {
    let region = non_blank(dynamodb.region).unwrap_or_else(|| DEFAULT_DYNAMODB_REGION.to_string());
    let table = non_blank(dynamodb.table).unwrap_or_else(|| DEFAULT_DYNAMODB_TABLE.to_string());
    let endpoint_url = non_blank(dynamodb.endpoint_url);

    Ok(DynamoDbSettings {
        region,
        endpoint_url,
        table,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match cache.backend {
        Some(value) => CacheBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("cache.backend", reason))?,
        None => CacheBackend::None,
    };

    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    let memcached_servers: Vec<String> = cache
        .memcached_servers
        .unwrap_or_else(|| vec![DEFAULT_MEMCACHED_SERVER.to_string()])
        .into_iter()
        .map(|server| server.trim().to_string())
        .filter(|server| !server.is_empty())
        .collect();
    if backend == CacheBackend::Memcached && memcached_servers.is_empty() {
        return Err(LoadError::invalid(
            "cache.memcached_servers",
            "at least one server is required for the memcached backend",
        ));
    }

    Ok(CacheSettings {
        backend,
        capacity,
        memcached_servers,
        ttl: Duration::from_secs(cache.ttl_seconds.unwrap_or(0)),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    backend: Option<String>,
    operation_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPostgresSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDynamoDbSettings {
    region: Option<String>,
    endpoint_url: Option<String>,
    table: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    capacity: Option<usize>,
    memcached_servers: Option<Vec<String>>,
    ttl_seconds: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
