//! File category classification.

use serde::{Deserialize, Serialize};

/// Coarse classification of an uploaded file, derived from its extension.
///
/// Categories drive per-category upload size limits and let the metadata
/// store filter listings without inspecting content types.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Archive,
    Other,
}

impl FileCategory {
    /// Classify a filename by its extension.
    ///
    /// Unknown or missing extensions resolve to `Other`; this never fails.
    pub fn from_filename(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => return Self::Other,
        };
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg" => Self::Image,
            "pdf" | "doc" | "docx" | "txt" | "rtf" | "odt" => Self::Document,
            "zip" | "rar" | "7z" | "tar" | "gz" => Self::Archive,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Archive => "archive",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "document" => Ok(Self::Document),
            "archive" => Ok(Self::Archive),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown category `{}`", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions() {
        let cases = [
            ("photo.jpg", FileCategory::Image),
            ("photo.png", FileCategory::Image),
            ("report.pdf", FileCategory::Document),
            ("report.docx", FileCategory::Document),
            ("bundle.zip", FileCategory::Archive),
            ("data.xyz", FileCategory::Other),
        ];
        for (name, expected) in cases {
            assert_eq!(FileCategory::from_filename(name), expected, "{}", name);
        }
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(FileCategory::from_filename("PHOTO.JPG"), FileCategory::Image);
        assert_eq!(FileCategory::from_filename("a.TaR"), FileCategory::Archive);
    }

    #[test]
    fn missing_extension_is_other() {
        assert_eq!(FileCategory::from_filename("README"), FileCategory::Other);
        assert_eq!(FileCategory::from_filename(".gitignore"), FileCategory::Other);
        assert_eq!(FileCategory::from_filename("trailing."), FileCategory::Other);
    }

    #[test]
    fn parses_from_str() {
        assert_eq!("image".parse::<FileCategory>().unwrap(), FileCategory::Image);
        assert!("video".parse::<FileCategory>().is_err());
    }
}
