//! Relational metadata row describing one uploaded object.

use super::category::FileCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Descriptive metadata for a stored object.
///
/// A `FileRecord` is created as the last step of a successful upload and is
/// linked to the object store only by the shared `key` string. The `key`
/// SHOULD reference an existing blob, but nothing enforces this
/// transactionally: readers must treat a dangling reference as a recoverable
/// "missing object" condition.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct FileRecord {
    /// Store-assigned numeric identity.
    pub id: i64,

    /// Object key, unique per object store.
    pub key: String,

    /// Display name (defaults to the original filename).
    pub name: String,

    /// Filename as supplied by the uploader.
    pub original_name: String,

    /// Payload size in bytes (post-compression, if any).
    pub size: i64,

    /// MIME content type.
    pub content_type: String,

    /// Derived public URL (`{endpoint}/{bucket}/{key}`); not independently
    /// authoritative.
    pub url: String,

    /// Logical folder, `"root"` when none was supplied.
    pub folder: String,

    /// Extension-derived category.
    pub category: FileCategory,

    /// Opaque uploader identity supplied by the caller.
    pub uploaded_by: String,

    /// Whether the file is publicly visible.
    pub is_public: bool,

    /// Open key-value provenance bag (original filename, uploader, upload
    /// timestamp, and a `preview` thumbnail data URL for image uploads).
    pub metadata: Json<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when inserting a new record. The store assigns `id`,
/// `created_at`, and `updated_at`.
#[derive(Clone, Debug)]
pub struct NewFileRecord {
    pub key: String,
    pub name: String,
    pub original_name: String,
    pub size: i64,
    pub content_type: String,
    pub url: String,
    pub folder: String,
    pub category: FileCategory,
    pub uploaded_by: String,
    pub is_public: bool,
    pub metadata: serde_json::Value,
}

/// Partial update applied by folder-move / visibility-toggle / rename
/// operations. `None` fields are left untouched.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct FileRecordUpdate {
    pub name: Option<String>,
    pub folder: Option<String>,
    pub is_public: Option<bool>,
}

impl FileRecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.folder.is_none() && self.is_public.is_none()
    }
}

/// Filters for metadata-backed listings. All filters are conjunctive;
/// results come back newest-first by `created_at`.
#[derive(Clone, Debug, Default)]
pub struct FileFilters {
    pub folder: Option<String>,
    pub category: Option<FileCategory>,
    pub uploaded_by: Option<String>,
    pub is_public: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
