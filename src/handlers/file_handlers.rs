//! HTTP handlers for file upload, listing, and deletion.
//! Parses multipart bodies and query filters, then delegates every storage
//! concern to `FileService`.

use crate::{
    errors::AppError,
    models::{
        category::FileCategory,
        file_record::{FileFilters, FileRecord, FileRecordUpdate},
        remote_object::RemoteObject,
        results::{DeletionResult, UploadResult},
    },
    services::file_service::{FileService, UploadRequest},
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying the caller-supplied uploader identity. Authentication
/// itself happens upstream; the broker only consumes the resolved identity.
const UPLOADER_HEADER: &str = "x-uploader-id";

/// Query params accepted by the metadata-backed listing.
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    pub folder: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "uploaded-by")]
    pub uploaded_by: Option<String>,
    pub public: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query params accepted by the object-store-backed listing.
#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub prefix: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadUrlQuery {
    #[serde(rename = "expires-secs")]
    pub expires_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    pub url: String,
}

/// POST `/files` — multipart upload.
///
/// Repeated `file` parts are uploaded sequentially; `folder`, `public`, and
/// `compress` text parts apply to every file in the batch. The response
/// carries one result per file, in input order.
pub async fn upload_files(
    State(service): State<FileService>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadResult>>, AppError> {
    let uploader = headers
        .get(UPLOADER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("missing {} header", UPLOADER_HEADER)))?;

    let mut folder: Option<String> = None;
    let mut is_public = false;
    let mut compress = false;
    let mut files: Vec<(String, String, bytes::Bytes)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {}", err)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| AppError::bad_request("file part is missing a filename"))?;
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("failed reading file part: {}", err))
                })?;
                files.push((original_name, content_type, bytes));
            }
            "folder" => {
                let value = read_text_field(field).await?;
                if !value.trim().is_empty() {
                    folder = Some(value);
                }
            }
            "public" => is_public = parse_flag(&read_text_field(field).await?),
            "compress" => compress = parse_flag(&read_text_field(field).await?),
            other => {
                return Err(AppError::bad_request(format!(
                    "unexpected multipart field `{}`",
                    other
                )));
            }
        }
    }

    if files.is_empty() {
        return Err(AppError::bad_request("no file parts in request"));
    }

    let requests = files
        .into_iter()
        .map(|(name, content_type, bytes)| {
            let mut request = UploadRequest::new(name, content_type, bytes)
                .public(is_public)
                .compressed(compress);
            if let Some(folder) = &folder {
                request = request.with_folder(folder.clone());
            }
            request
        })
        .collect();

    let results = service.upload_many(requests, &uploader).await;
    Ok(Json(results))
}

/// GET `/files` — metadata-backed listing with conjunctive filters.
pub async fn list_files(
    State(service): State<FileService>,
    Query(q): Query<ListFilesQuery>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    let category = q
        .category
        .as_deref()
        .map(|raw| {
            raw.parse::<FileCategory>()
                .map_err(|err| AppError::bad_request(err))
        })
        .transpose()?;

    let filters = FileFilters {
        folder: q.folder,
        category,
        uploaded_by: q.uploaded_by,
        is_public: q.public,
        limit: q.limit,
        offset: q.offset,
    };
    let records = service.list_records(&filters).await?;
    Ok(Json(records))
}

/// GET `/files/search` — case-insensitive name search.
pub async fn search_files(
    State(service): State<FileService>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    if q.q.trim().is_empty() {
        return Err(AppError::bad_request("query parameter `q` must not be empty"));
    }
    let records = service.search(&q.q, q.limit.unwrap_or(50)).await?;
    Ok(Json(records))
}

/// GET `/files/browse` — object-store-backed listing.
///
/// This path and `/files` are intentionally unreconciled views over the same
/// logical data; see the service docs.
pub async fn browse_objects(
    State(service): State<FileService>,
    Query(q): Query<BrowseQuery>,
) -> Result<Json<Vec<RemoteObject>>, AppError> {
    let objects = service
        .browse_objects(q.prefix.as_deref(), q.max_keys.unwrap_or(1000))
        .await?;
    Ok(Json(objects))
}

/// GET `/files/{id}` — single metadata record.
pub async fn get_file(
    State(service): State<FileService>,
    Path(id): Path<i64>,
) -> Result<Json<FileRecord>, AppError> {
    let record = service.get_record(id).await?;
    Ok(Json(record))
}

/// PATCH `/files/{id}` — folder move / visibility toggle / rename.
pub async fn update_file(
    State(service): State<FileService>,
    Path(id): Path<i64>,
    Json(update): Json<FileRecordUpdate>,
) -> Result<Json<FileRecord>, AppError> {
    if update.is_empty() {
        return Err(AppError::bad_request("update body has no fields"));
    }
    let record = service.update_record(id, &update).await?;
    Ok(Json(record))
}

/// DELETE `/files/{id}` — remove metadata, then attempt object cleanup.
///
/// A 200 response with `success: false` means the row is gone but the object
/// could not be removed.
pub async fn delete_file(
    State(service): State<FileService>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<DeletionResult>), AppError> {
    let result = service.delete_file(id).await?;
    Ok((StatusCode::OK, Json(result)))
}

/// GET `/files/{id}/download-url` — issue a short-lived pre-signed GET URL.
pub async fn download_url(
    State(service): State<FileService>,
    Path(id): Path<i64>,
    Query(q): Query<DownloadUrlQuery>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let url = service
        .download_url(id, q.expires_secs.map(Duration::from_secs))
        .await?;
    Ok(Json(DownloadUrlResponse { url }))
}

/// GET `/files/{id}/download` — redirect to a freshly pre-signed URL.
pub async fn download(
    State(service): State<FileService>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let url = service.download_url(id, None).await?;
    Ok(Redirect::temporary(&url))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|err| AppError::bad_request(format!("failed reading text field: {}", err)))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
