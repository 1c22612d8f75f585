//! File entity model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use doceditor_core::error::AppError;
use doceditor_core::types::FileId;

use super::version::FileVersion;

/// Kind of document a file holds. Fixed at upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// A PDF document.
    Pdf,
    /// A raster image.
    Image,
}

impl FileType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "image" => Ok(Self::Image),
            _ => Err(AppError::unsupported_type(format!(
                "Invalid file type: '{s}'. Expected one of: pdf, image"
            ))),
        }
    }
}

/// A logical document with an append-only chain of versions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique, never reused identifier.
    pub file_id: FileId,
    /// Name the file was uploaded under.
    pub original_name: String,
    /// Document kind.
    pub file_type: FileType,
    /// Lowercase extension without the dot.
    pub ext: String,
    /// When the file was uploaded.
    pub created_at: DateTime<Utc>,
    /// Highest committed version number.
    pub current_version: u32,
}

impl File {
    /// Name offered for downloads: the original name, or `{stem}_v{n}.{ext}`
    /// for anything but version 0.
    pub fn download_name(&self, version: u32) -> String {
        if version == 0 {
            return self.original_name.clone();
        }
        let stem = self
            .original_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.original_name);
        format!("{stem}_v{version}.{}", self.ext)
    }
}

/// A file together with its ordered version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// The file metadata.
    #[serde(flatten)]
    pub file: File,
    /// Versions in ascending order, starting at 0.
    pub versions: Vec<FileVersion>,
}
