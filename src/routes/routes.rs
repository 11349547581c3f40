//! Defines routes for the file broker's HTTP surface.
//!
//! ## Structure
//! - **Collection endpoints**
//!   - `POST /files`         — multipart upload (proxied write)
//!   - `GET  /files`         — metadata-backed listing (filterable)
//!   - `GET  /files/search`  — case-insensitive name search
//!   - `GET  /files/browse`  — object-store-backed listing (prefix, max-keys)
//!
//! - **Record endpoints**
//!   - `GET    /files/{id}`              — single metadata record
//!   - `PATCH  /files/{id}`              — folder move / visibility / rename
//!   - `DELETE /files/{id}`              — delete metadata, then object
//!   - `GET    /files/{id}/download-url` — issue a pre-signed GET URL
//!   - `GET    /files/{id}/download`     — redirect to a pre-signed GET URL
//!
//! The two listing endpoints are deliberately separate views and are never
//! merged; see `FileService`.

use crate::{
    handlers::{
        file_handlers::{
            browse_objects, delete_file, download, download_url, get_file, list_files,
            search_files, update_file, upload_files,
        },
        health_handlers::{healthz, readyz},
    },
    services::file_service::FileService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::get,
};

/// Request-body cap for uploads: the largest per-category size limit
/// (100 MiB for archives) plus headroom for multipart framing. Without this
/// layer axum's 2 MB default would reject valid uploads before any service
/// validation runs.
const MAX_UPLOAD_BODY_BYTES: usize = 104 * 1024 * 1024;

/// Build and return the router for all broker routes.
///
/// The router carries shared state (`FileService`) to all handlers.
pub fn routes() -> Router<FileService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // collection routes
        .route("/files", get(list_files).post(upload_files))
        .route("/files/search", get(search_files))
        .route("/files/browse", get(browse_objects))
        // record routes
        .route(
            "/files/{id}",
            get(get_file).patch(update_file).delete(delete_file),
        )
        .route("/files/{id}/download-url", get(download_url))
        .route("/files/{id}/download", get(download))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
}
