//! Object key derivation.
//!
//! Keys are unique by construction (millisecond timestamp plus a random
//! token), never by querying the store first. An optional pre-write
//! existence check lives in the file service, not here.

use chrono::Utc;
use uuid::Uuid;

/// Derive a unique object key from a filename and optional folder.
///
/// Layout: `{folder}/{timestamp}-{token}.{ext}`, or `{timestamp}-{token}.{ext}`
/// when no folder is supplied. The extension is carried over lowercased from
/// the original name and omitted entirely when the name has none.
pub fn make_key(original_name: &str, folder: Option<&str>) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let token = Uuid::new_v4().simple().to_string();

    let unique = match extension(original_name) {
        Some(ext) => format!("{}-{}.{}", timestamp, token, ext),
        None => format!("{}-{}", timestamp, token),
    };

    match folder {
        Some(f) if !f.is_empty() => format!("{}/{}", f, unique),
        _ => unique,
    }
}

/// Extract the extension of a filename, lowercased.
///
/// Returns `None` for names without a dot, dotfiles like `.gitignore`, and
/// names ending in a bare dot.
pub fn extension(name: &str) -> Option<String> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            Some(ext.to_ascii_lowercase())
        }
        _ => None,
    }
}
