//! Core data models for the file broker.
//!
//! These entities describe uploaded files and their object-store
//! counterparts. Metadata rows map to the `files` table via `sqlx::FromRow`
//! and serialize naturally as JSON via `serde`.

pub mod category;
pub mod file_record;
pub mod remote_object;
pub mod results;
