use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::file_service::FileService;
use services::metadata_store::MetadataStore;
use services::object_store::{ObjectStore, S3Store};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        endpoint = %cfg.s3_endpoint,
        bucket = %cfg.s3_bucket,
        "starting file-broker"
    );

    // --- Initialize SQLite connection ---
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("created missing directory {:?}", parent);
        }
    }

    // SQLx refuses to create the database file on its own
    if !Path::new(db_path).exists() {
        fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(db_path)?;
    }

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&cfg.database_url)
            .await?,
    );

    let metadata = MetadataStore::new(db);
    metadata.migrate().await?;
    if migrate {
        tracing::info!("database migration complete");
        return Ok(()); // exit after migration
    }

    // --- Initialize object store client + core service ---
    let store = S3Store::new(
        &cfg.s3_endpoint,
        &cfg.s3_region,
        &cfg.s3_bucket,
        cfg.s3_access_key_id.as_deref(),
        cfg.s3_secret_access_key.as_deref(),
    )?;
    if let Err(err) = store.check_bucket().await {
        tracing::warn!(error = %err, "object store bucket probe failed at startup");
    }

    let mut service = FileService::new(Arc::new(store), metadata)
        .with_key_existence_check(cfg.check_key_exists)
        .with_presign_expiry(Duration::from_secs(cfg.presign_expiry_secs));
    if let Some(allowed) = cfg.allowed_types.clone() {
        service = service.with_allowed_types(allowed);
    }

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
