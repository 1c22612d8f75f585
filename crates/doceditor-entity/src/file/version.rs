//! File version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One immutable committed state of a file.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileVersion {
    /// Sequential version number; 0 is the upload.
    pub version: u32,
    /// When this version was committed.
    pub created_at: DateTime<Utc>,
    /// Name of the operation that produced it (e.g. `"image_crop"`).
    pub action: String,
    /// Parameters of that operation. Opaque to the store.
    pub details: serde_json::Value,
}
