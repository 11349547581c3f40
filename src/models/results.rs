//! Typed per-operation results consumed by the notification layer.
//!
//! The broker never lets a raw transport error escape an upload or deletion
//! call site; callers always receive one of these discriminated results.

use super::file_record::FileRecord;
use serde::{Deserialize, Serialize};

/// Outcome of a single file upload.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    pub fn ok(file: FileRecord) -> Self {
        Self {
            success: true,
            file: Some(file),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            file: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a file deletion.
///
/// `success: false` with the metadata row already removed means the
/// object-cleanup half failed and the blob is now an orphan.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeletionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeletionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}
