//! High-level file operations: upload orchestration, deletion, and the two
//! listing paths.
//!
//! The object store and the metadata store fail independently; there is no
//! transaction spanning both. Upload writes the object first, then the
//! metadata row; deletion removes the metadata row first, then the object.
//! The resulting partial-failure modes (orphan objects, dangling references)
//! are accepted steady-state conditions, not silently repaired here.

use super::image_ops;
use super::metadata_store::MetadataStore;
use super::naming;
use super::object_store::ObjectStore;
use super::{FileError, FileResult};
use crate::models::category::FileCategory;
use crate::models::file_record::{FileFilters, FileRecord, FileRecordUpdate, NewFileRecord};
use crate::models::remote_object::RemoteObject;
use crate::models::results::{DeletionResult, UploadResult};
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempts at deriving a fresh key when the optional pre-write existence
/// check is enabled and reports a collision.
const KEY_ATTEMPTS: usize = 3;

/// Per-category upload size limits, in bytes.
#[derive(Clone, Copy, Debug)]
pub struct SizeLimits {
    pub image: i64,
    pub document: i64,
    pub archive: i64,
    pub other: i64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            image: 10 * 1024 * 1024,
            document: 25 * 1024 * 1024,
            archive: 100 * 1024 * 1024,
            other: 25 * 1024 * 1024,
        }
    }
}

impl SizeLimits {
    pub fn limit_for(&self, category: FileCategory) -> i64 {
        match category {
            FileCategory::Image => self.image,
            FileCategory::Document => self.document,
            FileCategory::Archive => self.archive,
            FileCategory::Other => self.other,
        }
    }
}

/// One file to upload.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Filename as supplied by the uploader.
    pub original_name: String,
    /// MIME content type.
    pub content_type: String,
    /// Payload bytes.
    pub bytes: Bytes,
    /// Logical folder; `None` means the key gets no prefix and the record
    /// lands in `"root"`.
    pub folder: Option<String>,
    /// Whether the file should be publicly visible.
    pub is_public: bool,
    /// Whether image payloads should be re-encoded before upload.
    pub compress: bool,
}

impl UploadRequest {
    pub fn new(
        original_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Bytes,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            content_type: content_type.into(),
            bytes,
            folder: None,
            is_public: false,
            compress: false,
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        let folder = folder.into();
        self.folder = if folder.trim().is_empty() {
            None
        } else {
            Some(folder)
        };
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Orchestrates uploads, deletions, and listings over the two backing
/// stores.
#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn ObjectStore>,
    metadata: MetadataStore,
    limits: SizeLimits,
    allowed_types: Option<Vec<String>>,
    check_key_exists: bool,
    presign_expiry: Duration,
}

impl FileService {
    pub fn new(store: Arc<dyn ObjectStore>, metadata: MetadataStore) -> Self {
        Self {
            store,
            metadata,
            limits: SizeLimits::default(),
            allowed_types: None,
            check_key_exists: false,
            presign_expiry: Duration::from_secs(900),
        }
    }

    pub fn with_limits(mut self, limits: SizeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Restrict uploads to the given content types. Entries ending in `/*`
    /// match the whole top-level type (e.g. `image/*`).
    pub fn with_allowed_types(mut self, allowed: Vec<String>) -> Self {
        self.allowed_types = Some(allowed);
        self
    }

    /// Enable the optional pre-write key existence check. Key uniqueness is
    /// otherwise guaranteed only by construction.
    pub fn with_key_existence_check(mut self, enabled: bool) -> Self {
        self.check_key_exists = enabled;
        self
    }

    /// Lifetime applied to pre-signed URLs when the caller does not ask for
    /// a specific one.
    pub fn with_presign_expiry(mut self, expiry: Duration) -> Self {
        self.presign_expiry = expiry;
        self
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Connectivity probe against the object store, used by readiness checks.
    pub async fn check_store(&self) -> FileResult<()> {
        self.store.check_bucket().await
    }

    /// Upload one file and return a typed result; errors never escape as
    /// raw failures.
    pub async fn upload(&self, request: UploadRequest, uploader: &str) -> UploadResult {
        match self.try_upload(request, uploader).await {
            Ok(record) => UploadResult::ok(record),
            Err(err) => {
                warn!(error = %err, "upload failed");
                UploadResult::failed(err.to_string())
            }
        }
    }

    /// Upload a batch strictly one file at a time, preserving input order.
    ///
    /// Sequential processing keeps compression buffers and caller-facing
    /// feedback ordering predictable; one file's failure does not abort the
    /// rest.
    pub async fn upload_many(
        &self,
        requests: Vec<UploadRequest>,
        uploader: &str,
    ) -> Vec<UploadResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.upload(request, uploader).await);
        }
        results
    }

    async fn try_upload(&self, request: UploadRequest, uploader: &str) -> FileResult<FileRecord> {
        if request.original_name.trim().is_empty() {
            return Err(FileError::Validation("filename must not be empty".into()));
        }

        let category = FileCategory::from_filename(&request.original_name);

        // Rejections happen before any network I/O: no object or metadata is
        // ever written for an invalid file.
        let limit = self.limits.limit_for(category);
        if request.bytes.len() as i64 > limit {
            return Err(FileError::Validation(format!(
                "file `{}` is {} bytes, over the {} limit of {} bytes",
                request.original_name,
                request.bytes.len(),
                category,
                limit
            )));
        }
        if let Some(allowed) = &self.allowed_types {
            if !content_type_allowed(allowed, &request.content_type) {
                return Err(FileError::Validation(format!(
                    "content type `{}` is not allowed",
                    request.content_type
                )));
            }
        }

        // Image payloads may be re-encoded; a preprocessing failure falls
        // back to the original bytes rather than aborting the upload.
        let bytes = if request.compress && request.content_type.starts_with("image/") {
            match image_ops::compress(&request.bytes, &request.content_type, image_ops::DEFAULT_QUALITY)
            {
                Ok(reencoded) => {
                    debug!(
                        original = request.bytes.len(),
                        reencoded = reencoded.len(),
                        "image re-encoded before upload"
                    );
                    Bytes::from(reencoded)
                }
                Err(err) => {
                    warn!(error = %err, "image preprocessing failed, uploading original bytes");
                    request.bytes.clone()
                }
            }
        } else {
            request.bytes.clone()
        };

        // Image uploads get a thumbnail data URL in the provenance bag; a
        // preview failure is non-fatal and just omits the field.
        let preview = if request.content_type.starts_with("image/") {
            image_ops::generate_preview(&bytes).ok()
        } else {
            None
        };

        let key = self
            .derive_key(&request.original_name, request.folder.as_deref())
            .await?;

        let uploaded_at = Utc::now();
        let tags = HashMap::from([
            ("original-name".to_string(), request.original_name.clone()),
            ("uploaded-by".to_string(), uploader.to_string()),
            ("uploaded-at".to_string(), uploaded_at.to_rfc3339()),
        ]);

        let outcome = self
            .store
            .put(&key, bytes.clone(), &request.content_type, tags)
            .await?;

        let mut metadata = json!({
            "originalName": request.original_name,
            "uploadedBy": uploader,
            "uploadedAt": uploaded_at.to_rfc3339(),
        });
        if let Some(preview) = preview {
            metadata["preview"] = serde_json::Value::String(preview);
        }

        let record = NewFileRecord {
            url: self.store.public_url(&outcome.key),
            key: outcome.key,
            name: request.original_name.clone(),
            original_name: request.original_name.clone(),
            size: bytes.len() as i64,
            content_type: request.content_type.clone(),
            folder: request.folder.unwrap_or_else(|| "root".to_string()),
            category,
            uploaded_by: uploader.to_string(),
            is_public: request.is_public,
            metadata,
        };

        // No compensating delete when the metadata write fails: the object
        // just written becomes an orphan, a documented limitation of the
        // two-store design.
        match self.metadata.insert(record).await {
            Ok(stored) => Ok(stored),
            Err(err) => {
                warn!(error = %err, "metadata insert failed after object write, object is orphaned");
                Err(err)
            }
        }
    }

    async fn derive_key(&self, original_name: &str, folder: Option<&str>) -> FileResult<String> {
        if !self.check_key_exists {
            return Ok(naming::make_key(original_name, folder));
        }

        for _ in 0..KEY_ATTEMPTS {
            let key = naming::make_key(original_name, folder);
            if !self.store.exists(&key).await? {
                return Ok(key);
            }
            warn!(key = %key, "derived key already exists, retrying");
        }
        Err(FileError::Store(format!(
            "could not derive an unused key for `{}` in {} attempts",
            original_name, KEY_ATTEMPTS
        )))
    }

    /// Delete a file's metadata row, then attempt to delete its object.
    ///
    /// The row is removed before the object deletion is attempted; when the
    /// object half fails the blob is orphaned with no index entry pointing
    /// to it, and the result reports the cleanup failure.
    pub async fn delete_file(&self, id: i64) -> FileResult<DeletionResult> {
        let record = self.metadata.get_by_id(id).await?;
        self.metadata.delete(id).await?;

        match self.store.delete(&record.key).await {
            Ok(()) => Ok(DeletionResult::ok()),
            Err(err) => {
                warn!(key = %record.key, error = %err, "object cleanup failed after metadata delete");
                Ok(DeletionResult::failed(format!(
                    "metadata removed, but object cleanup failed: {}",
                    err
                )))
            }
        }
    }

    /// Object-store-backed listing; the store is the source of truth.
    ///
    /// Does not reflect visibility or category overrides that live only in
    /// metadata, and is intentionally never merged with [`Self::list_records`].
    pub async fn browse_objects(
        &self,
        prefix: Option<&str>,
        max_keys: usize,
    ) -> FileResult<Vec<RemoteObject>> {
        self.store.list_with_prefix(prefix, max_keys).await
    }

    /// Metadata-backed listing; the relational store is the source of truth.
    ///
    /// May include rows whose object no longer exists, and omits objects
    /// uploaded without a metadata write.
    pub async fn list_records(&self, filters: &FileFilters) -> FileResult<Vec<FileRecord>> {
        self.metadata.query_by_filters(filters).await
    }

    pub async fn search(&self, term: &str, limit: i64) -> FileResult<Vec<FileRecord>> {
        self.metadata.search_by_name(term, limit).await
    }

    pub async fn get_record(&self, id: i64) -> FileResult<FileRecord> {
        self.metadata.get_by_id(id).await
    }

    /// Folder move / visibility toggle / rename.
    pub async fn update_record(
        &self,
        id: i64,
        update: &FileRecordUpdate,
    ) -> FileResult<FileRecord> {
        self.metadata.update(id, update).await
    }

    /// Issue a short-lived pre-signed download URL for a record's object.
    pub async fn download_url(&self, id: i64, expires_in: Option<Duration>) -> FileResult<String> {
        let record = self.metadata.get_by_id(id).await?;
        self.store
            .presign_get(&record.key, expires_in.unwrap_or(self.presign_expiry))
            .await
    }
}

fn content_type_allowed(allowed: &[String], content_type: &str) -> bool {
    allowed.iter().any(|entry| {
        if let Some(top_level) = entry.strip_suffix("/*") {
            content_type
                .split('/')
                .next()
                .is_some_and(|t| t == top_level)
        } else {
            entry == content_type
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::metadata_store::tests::memory_store;
    use crate::services::object_store::PutOutcome;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use image::ImageFormat;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory spy store: records blobs and counts put invocations so
    /// tests can assert that rejected uploads never reach the store.
    #[derive(Default)]
    pub(crate) struct MemoryObjectStore {
        blobs: Mutex<Vec<(String, Bytes, DateTime<Utc>)>>,
        put_calls: AtomicUsize,
        fail_puts: bool,
        fail_deletes: bool,
    }

    impl MemoryObjectStore {
        fn put_count(&self) -> usize {
            self.put_calls.load(Ordering::SeqCst)
        }

        fn blob(&self, key: &str) -> Option<Bytes> {
            self.blobs
                .lock()
                .unwrap()
                .iter()
                .find(|(k, _, _)| k == key)
                .map(|(_, b, _)| b.clone())
        }

        fn len(&self) -> usize {
            self.blobs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn put(
            &self,
            key: &str,
            bytes: Bytes,
            _content_type: &str,
            _tags: HashMap<String, String>,
        ) -> FileResult<PutOutcome> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_puts {
                return Err(FileError::Network("simulated transport failure".into()));
            }
            self.blobs
                .lock()
                .unwrap()
                .push((key.to_string(), bytes, Utc::now()));
            Ok(PutOutcome {
                key: key.to_string(),
                etag: Some("fake-etag".to_string()),
            })
        }

        async fn list_with_prefix(
            &self,
            prefix: Option<&str>,
            max_keys: usize,
        ) -> FileResult<Vec<RemoteObject>> {
            let mut objects: Vec<RemoteObject> = self
                .blobs
                .lock()
                .unwrap()
                .iter()
                .filter(|(key, _, _)| prefix.is_none_or(|p| key.starts_with(p)))
                .map(|(key, bytes, modified)| RemoteObject {
                    key: key.clone(),
                    size: bytes.len() as i64,
                    etag: Some("fake-etag".to_string()),
                    last_modified: Some(*modified),
                    url: self.public_url(key),
                })
                .collect();
            objects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
            objects.truncate(max_keys.clamp(1, 1000));
            Ok(objects)
        }

        async fn delete(&self, key: &str) -> FileResult<()> {
            if self.fail_deletes {
                return Err(FileError::Network("simulated transport failure".into()));
            }
            // Missing keys are a no-op success.
            self.blobs.lock().unwrap().retain(|(k, _, _)| k != key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> FileResult<bool> {
            Ok(self.blob(key).is_some())
        }

        async fn check_bucket(&self) -> FileResult<()> {
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("http://localhost:9000/test-bucket/{}", key)
        }

        async fn presign_get(&self, key: &str, expires_in: Duration) -> FileResult<String> {
            Ok(format!(
                "{}?expires={}&signature=fake",
                self.public_url(key),
                expires_in.as_secs()
            ))
        }
    }

    /// Service over the spy store and an in-memory metadata store; shared
    /// with the router-level tests.
    pub(crate) async fn memory_service() -> (Arc<MemoryObjectStore>, FileService) {
        service_with(MemoryObjectStore::default()).await
    }

    async fn service() -> (Arc<MemoryObjectStore>, FileService) {
        memory_service().await
    }

    async fn service_with(store: MemoryObjectStore) -> (Arc<MemoryObjectStore>, FileService) {
        let store = Arc::new(store);
        let metadata = memory_store().await;
        let service = FileService::new(store.clone(), metadata);
        (store, service)
    }

    fn text_file(name: &str, content: &str) -> UploadRequest {
        UploadRequest::new(name, "text/plain", Bytes::from(content.to_string()))
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(128, 128, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 40])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn upload_round_trips_metadata() {
        let (store, service) = service().await;
        let request = text_file("notes.txt", "hello").with_folder("docs");

        let result = service.upload(request, "user-7").await;
        assert!(result.success, "{:?}", result.error);

        let record = result.file.unwrap();
        assert_eq!(record.name, "notes.txt");
        assert_eq!(record.original_name, "notes.txt");
        assert_eq!(record.size, 5);
        assert_eq!(record.content_type, "text/plain");
        assert_eq!(record.folder, "docs");
        assert_eq!(record.category, FileCategory::Document);
        assert_eq!(record.uploaded_by, "user-7");
        assert!(record.key.starts_with("docs/"), "{}", record.key);
        assert!(record.url.ends_with(&record.key), "{}", record.url);
        assert_eq!(record.metadata.0["originalName"], "notes.txt");
        assert_eq!(record.metadata.0["uploadedBy"], "user-7");

        assert_eq!(store.blob(&record.key).unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn upload_without_folder_defaults_to_root() {
        let (_store, service) = service().await;
        let record = service
            .upload(text_file("a.txt", "x"), "u")
            .await
            .file
            .unwrap();
        assert_eq!(record.folder, "root");
        assert!(!record.key.contains('/'), "{}", record.key);
    }

    #[tokio::test]
    async fn oversized_upload_never_reaches_the_store() {
        let (store, service) = service().await;
        let service = service.with_limits(SizeLimits {
            document: 4,
            ..Default::default()
        });

        let result = service.upload(text_file("big.txt", "too large"), "u").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("validation"));
        assert_eq!(store.put_count(), 0);
        assert!(
            service
                .list_records(&FileFilters::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn disallowed_content_type_is_rejected_before_io() {
        let (store, service) = service().await;
        let service = service.with_allowed_types(vec!["image/*".to_string()]);

        let result = service.upload(text_file("a.txt", "x"), "u").await;

        assert!(!result.success);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn allowed_type_wildcards_match_top_level() {
        let allowed = vec!["image/*".to_string(), "application/pdf".to_string()];
        assert!(content_type_allowed(&allowed, "image/png"));
        assert!(content_type_allowed(&allowed, "application/pdf"));
        assert!(!content_type_allowed(&allowed, "application/zip"));
        assert!(!content_type_allowed(&allowed, "imagery/png"));
    }

    #[tokio::test]
    async fn same_name_uploads_get_distinct_keys() {
        let (_store, service) = service().await;
        let a = service
            .upload(text_file("dup.txt", "1").with_folder("f"), "u")
            .await
            .file
            .unwrap();
        let b = service
            .upload(text_file("dup.txt", "2").with_folder("f"), "u")
            .await
            .file
            .unwrap();
        assert_ne!(a.key, b.key);
    }

    #[tokio::test]
    async fn upload_many_is_sequential_and_isolated() {
        let (_store, service) = service().await;
        let service = service.with_limits(SizeLimits {
            document: 8,
            ..Default::default()
        });

        let results = service
            .upload_many(
                vec![
                    text_file("ok1.txt", "fine"),
                    text_file("big.txt", "way too large"),
                    text_file("ok2.txt", "fine"),
                ],
                "u",
            )
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.success).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert_eq!(results[0].file.as_ref().unwrap().name, "ok1.txt");
        assert_eq!(results[2].file.as_ref().unwrap().name, "ok2.txt");
    }

    #[tokio::test]
    async fn put_failure_leaves_no_metadata() {
        let (store, service) = service_with(MemoryObjectStore {
            fail_puts: true,
            ..Default::default()
        })
        .await;

        let result = service.upload(text_file("a.txt", "x"), "u").await;

        assert!(!result.success);
        assert_eq!(store.put_count(), 1);
        assert!(
            service
                .list_records(&FileFilters::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn metadata_failure_after_put_leaves_an_orphan() {
        // A metadata store without its schema makes every insert fail, which
        // simulates the second half of the saga failing after the object
        // write succeeded.
        let store = Arc::new(MemoryObjectStore::default());
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let service = FileService::new(store.clone(), MetadataStore::new(Arc::new(pool)));

        let result = service.upload(text_file("a.txt", "x"), "u").await;

        assert!(!result.success);
        // The object stays behind: no compensating delete.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_both_halves() {
        let (store, service) = service().await;
        let record = service
            .upload(text_file("a.txt", "x"), "u")
            .await
            .file
            .unwrap();

        let result = service.delete_file(record.id).await.unwrap();
        assert!(result.success);
        assert!(matches!(
            service.get_record(record.id).await,
            Err(FileError::NotFound(_))
        ));
        assert!(store.blob(&record.key).is_none());
    }

    #[tokio::test]
    async fn delete_missing_id_is_not_found() {
        let (_store, service) = service().await;
        assert!(matches!(
            service.delete_file(424242).await,
            Err(FileError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_object_cleanup_still_removes_metadata() {
        let (store, service) = service_with(MemoryObjectStore {
            fail_deletes: true,
            ..Default::default()
        })
        .await;
        let record = service
            .upload(text_file("a.txt", "x"), "u")
            .await
            .file
            .unwrap();

        let result = service.delete_file(record.id).await.unwrap();

        // Metadata-first ordering: the row is gone even though the object
        // half failed, leaving an orphan blob.
        assert!(!result.success);
        assert!(matches!(
            service.get_record(record.id).await,
            Err(FileError::NotFound(_))
        ));
        assert!(store.blob(&record.key).is_some());
    }

    #[tokio::test]
    async fn browse_after_upload_sees_the_new_key() {
        let (_store, service) = service().await;
        let record = service
            .upload(text_file("a.txt", "x").with_folder("inbox"), "u")
            .await
            .file
            .unwrap();

        let listed = service.browse_objects(Some("inbox/"), 100).await.unwrap();
        assert!(listed.iter().any(|obj| obj.key == record.key));
    }

    #[tokio::test]
    async fn listing_paths_stay_unreconciled() {
        let (store, service) = service().await;
        let record = service
            .upload(text_file("a.txt", "x"), "u")
            .await
            .file
            .unwrap();

        // Remove the blob behind the metadata store's back: the metadata
        // listing still returns the row (dangling reference), the object
        // listing no longer shows the key.
        store.blobs.lock().unwrap().clear();

        let records = service.list_records(&FileFilters::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, record.key);

        let objects = service.browse_objects(None, 100).await.unwrap();
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn compression_reencodes_image_payloads() {
        let (store, service) = service().await;
        let payload = jpeg_bytes();
        let request = UploadRequest::new("photo.jpg", "image/jpeg", Bytes::from(payload))
            .compressed(true);

        let record = service.upload(request, "u").await.file.unwrap();

        let stored = store.blob(&record.key).unwrap();
        assert_eq!(record.size, stored.len() as i64);
        assert!(image::load_from_memory(&stored).is_ok());
    }

    #[tokio::test]
    async fn image_uploads_carry_a_preview_data_url() {
        let (_store, service) = service().await;
        let request = UploadRequest::new("photo.jpg", "image/jpeg", Bytes::from(jpeg_bytes()));

        let record = service.upload(request, "u").await.file.unwrap();

        let preview = record.metadata.0["preview"].as_str().unwrap();
        assert!(preview.starts_with("data:image/png;base64,"), "{}", preview);
    }

    #[tokio::test]
    async fn non_image_uploads_have_no_preview() {
        let (_store, service) = service().await;
        let record = service
            .upload(text_file("a.txt", "x"), "u")
            .await
            .file
            .unwrap();
        assert!(record.metadata.0.get("preview").is_none());
    }

    #[tokio::test]
    async fn compression_failure_falls_back_to_original_bytes() {
        let (store, service) = service().await;
        let request = UploadRequest::new(
            "broken.jpg",
            "image/jpeg",
            Bytes::from_static(b"not an image"),
        )
        .compressed(true);

        let result = service.upload(request, "u").await;

        assert!(result.success, "{:?}", result.error);
        let record = result.file.unwrap();
        assert_eq!(record.size, "not an image".len() as i64);
        assert_eq!(
            store.blob(&record.key).unwrap(),
            Bytes::from_static(b"not an image")
        );
    }

    #[tokio::test]
    async fn key_existence_check_does_not_disturb_normal_uploads() {
        let (_store, service) = service().await;
        let service = service.with_key_existence_check(true);

        let result = service.upload(text_file("a.txt", "x"), "u").await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn update_moves_folder_and_toggles_visibility() {
        let (_store, service) = service().await;
        let record = service
            .upload(text_file("a.txt", "x"), "u")
            .await
            .file
            .unwrap();

        let updated = service
            .update_record(
                record.id,
                &FileRecordUpdate {
                    folder: Some("archive".to_string()),
                    is_public: Some(true),
                    name: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.folder, "archive");
        assert!(updated.is_public);
        // Folder moves touch metadata only; the object key is unchanged.
        assert_eq!(updated.key, record.key);
    }

    #[tokio::test]
    async fn download_url_is_derived_from_the_record_key() {
        let (_store, service) = service().await;
        let record = service
            .upload(text_file("a.txt", "x"), "u")
            .await
            .file
            .unwrap();

        let url = service
            .download_url(record.id, Some(Duration::from_secs(300)))
            .await
            .unwrap();
        assert!(url.contains(&record.key));
        assert!(url.contains("expires=300"));
    }
}
