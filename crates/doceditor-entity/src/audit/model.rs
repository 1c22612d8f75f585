//! Audit log entry entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An immutable audit log entry recording a user action.
///
/// `file_id` is kept as text so entries outlive the file they reference.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    /// Sequential entry id.
    pub id: i64,
    /// When the action occurred.
    pub timestamp: DateTime<Utc>,
    /// Opaque user label.
    #[sqlx(rename = "user_name")]
    pub user: String,
    /// The action that was performed (e.g. `"upload"`, `"revert"`).
    pub action: String,
    /// The file the action targeted, empty when none.
    pub file_id: String,
    /// Additional details about the action.
    pub details: serde_json::Value,
}

/// Data required to create a new audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    /// Opaque user label.
    pub user: String,
    /// The action performed.
    pub action: String,
    /// Target file id, empty when none.
    pub file_id: String,
    /// Additional details.
    pub details: serde_json::Value,
}
