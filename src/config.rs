use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
///
/// Object store credentials are server-side configuration only; they are
/// never exposed through the HTTP surface.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    /// Optional content-type allow-list; `None` accepts everything.
    pub allowed_types: Option<Vec<String>>,
    /// Optional pre-write key existence check.
    pub check_key_exists: bool,
    /// Lifetime of issued pre-signed download URLs.
    pub presign_expiry_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Upload broker for S3-backed file storage")]
pub struct Args {
    /// Host to bind to (overrides FILE_BROKER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_BROKER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides FILE_BROKER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object store endpoint (overrides FILE_BROKER_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Object store region (overrides FILE_BROKER_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Bucket name (overrides FILE_BROKER_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    ///
    /// Credentials are read from FILE_BROKER_S3_ACCESS_KEY_ID and
    /// FILE_BROKER_S3_SECRET_ACCESS_KEY; there are no CLI flags for them so
    /// they never show up in process listings.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        let env_host = env::var("FILE_BROKER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("FILE_BROKER_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing FILE_BROKER_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading FILE_BROKER_PORT"),
        };
        let env_db = env::var("FILE_BROKER_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/file_broker.db".into());
        let env_endpoint =
            env::var("FILE_BROKER_S3_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".into());
        let env_region = env::var("FILE_BROKER_S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let env_bucket = env::var("FILE_BROKER_S3_BUCKET").unwrap_or_else(|_| "files".into());

        let allowed_types = env::var("FILE_BROKER_ALLOWED_TYPES").ok().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        let check_key_exists = match env::var("FILE_BROKER_CHECK_KEY_EXISTS") {
            Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => false,
        };

        let presign_expiry_secs = match env::var("FILE_BROKER_PRESIGN_EXPIRY_SECS") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| format!("parsing FILE_BROKER_PRESIGN_EXPIRY_SECS `{}`", value))?,
            Err(_) => 900,
        };

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            s3_endpoint: args.s3_endpoint.unwrap_or(env_endpoint),
            s3_region: args.s3_region.unwrap_or(env_region),
            s3_bucket: args.s3_bucket.unwrap_or(env_bucket),
            s3_access_key_id: env::var("FILE_BROKER_S3_ACCESS_KEY_ID").ok(),
            s3_secret_access_key: env::var("FILE_BROKER_S3_SECRET_ACCESS_KEY").ok(),
            allowed_types,
            check_key_exists,
            presign_expiry_secs,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
