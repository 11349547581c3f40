//! Listing entry sourced directly from the object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blob as seen by the object store, independent of any metadata row.
///
/// Object-store-backed listings convert these directly into display items;
/// they do not reflect `is_public` or `category` overrides that live only in
/// the metadata store.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RemoteObject {
    /// Object key within the bucket.
    pub key: String,

    /// Size in bytes as reported by the store.
    pub size: i64,

    /// Store-computed checksum, if reported.
    pub etag: Option<String>,

    /// Last-modified timestamp as reported by the store.
    pub last_modified: Option<DateTime<Utc>>,

    /// Derived public URL for path-style addressing.
    pub url: String,
}
