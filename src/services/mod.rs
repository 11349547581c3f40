//! Storage services: object-store client, metadata store, naming,
//! image preprocessing, and the orchestrating file service.

pub mod file_service;
pub mod image_ops;
pub mod metadata_store;
pub mod naming;
pub mod object_store;

use thiserror::Error;

/// Error kinds shared by every storage component.
///
/// Validation errors are raised before any I/O. I/O errors from either
/// backing store are caught at the file-service boundary and surfaced as
/// typed results rather than thrown past the call site.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("object store credentials missing or invalid: {0}")]
    Credential(String),
    #[error("object store rejected the request: {0}")]
    Permission(String),
    #[error("transport failure talking to the object store: {0}")]
    Network(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("backing store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for FileError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => FileError::NotFound("record".into()),
            other => FileError::Store(other.to_string()),
        }
    }
}

pub type FileResult<T> = Result<T, FileError>;
