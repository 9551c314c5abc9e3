use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::tokenizer::TokenizerMode;

pub const APP_NAME: &str = "event-loader";

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "postgres")]
    pub warehouse: WarehouseKind,

    #[envconfig(default = "s3")]
    pub blob_source: BlobSourceKind,

    // Root directory when BLOB_SOURCE=folder, blobs are read from <root>/<bucket>/<key>
    #[envconfig(default = ".")]
    pub blob_folder: String,

    // Point the S3 client at MinIO or similar
    pub aws_endpoint_url: Option<String>,

    #[envconfig(default = "structural")]
    pub tokenizer_mode: TokenizerMode,

    #[envconfig(from = "LOAD_TIMEOUT_MS", default = "30000")]
    pub load_timeout: EnvMsDuration,

    #[envconfig(nested = true)]
    pub warehouse_connection: WarehouseConfig,
}

#[derive(Envconfig, Clone)]
pub struct WarehouseConfig {
    #[envconfig(from = "WAREHOUSE_HOST", default = "localhost")]
    pub host: String,

    #[envconfig(from = "WAREHOUSE_PORT", default = "5439")]
    pub port: u16,

    #[envconfig(from = "WAREHOUSE_USER", default = "loader")]
    pub user: String,

    #[envconfig(from = "WAREHOUSE_PASSWORD", default = "")]
    pub password: String,

    #[envconfig(from = "WAREHOUSE_DATABASE", default = "tracking")]
    pub database: String,

    #[envconfig(from = "WAREHOUSE_DESTINATION", default = "tracking.events")]
    pub destination: String,

    // One ingestion holds a single connection for its whole batch
    #[envconfig(default = "1")]
    pub max_pg_connections: u32,

    #[envconfig(from = "WAREHOUSE_REQUIRE_TLS", default = "false")]
    pub require_tls: bool,
}

impl WarehouseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_tls {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(ssl_mode)
            .application_name(APP_NAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarehouseKind {
    Postgres,
    Memory,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseKindError(String);

impl FromStr for WarehouseKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(WarehouseKind::Postgres),
            "memory" => Ok(WarehouseKind::Memory),
            invalid => Err(ParseKindError(invalid.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobSourceKind {
    S3,
    Folder,
}

impl FromStr for BlobSourceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(BlobSourceKind::S3),
            "folder" => Ok(BlobSourceKind::Folder),
            invalid => Err(ParseKindError(invalid.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
