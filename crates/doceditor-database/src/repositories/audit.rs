//! Audit log repository implementation.

use chrono::Utc;
use sqlx::SqlitePool;

use doceditor_core::error::{AppError, ErrorKind};
use doceditor_core::result::AppResult;
use doceditor_entity::audit::{AuditLogEntry, CreateAuditLogEntry};

/// Repository for audit log entries. Rows are only ever inserted.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

impl AuditLogRepository {
    /// Create a new audit log repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an audit log entry.
    pub async fn create(&self, data: &CreateAuditLogEntry) -> AppResult<AuditLogEntry> {
        sqlx::query_as::<_, AuditLogEntry>(
            "INSERT INTO audit_log (timestamp, user_name, action, file_id, details) \
             VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(Utc::now())
        .bind(&data.user)
        .bind(&data.action)
        .bind(&data.file_id)
        .bind(&data.details)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::StorageFailure, "Failed to create audit entry", e)
        })
    }

    /// The `limit` most recent entries, newest first, optionally for one file.
    pub async fn find_recent(
        &self,
        limit: u32,
        file_id: Option<&str>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let query = match file_id {
            Some(id) => sqlx::query_as::<_, AuditLogEntry>(
                "SELECT * FROM audit_log WHERE file_id = ? ORDER BY id DESC LIMIT ?",
            )
            .bind(id.to_string()),
            None => sqlx::query_as::<_, AuditLogEntry>(
                "SELECT * FROM audit_log ORDER BY id DESC LIMIT ?",
            ),
        };

        query
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::StorageFailure, "Failed to search audit log", e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::run_migrations;
    use crate::DatabasePool;
    use doceditor_core::config::DatabaseConfig;

    async fn setup() -> (tempfile::TempDir, AuditLogRepository) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("audit.db").display()),
            ..DatabaseConfig::default()
        };
        let db = DatabasePool::connect(&config).await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        (dir, AuditLogRepository::new(db.pool().clone()))
    }

    fn entry(action: &str, file_id: &str) -> CreateAuditLogEntry {
        CreateAuditLogEntry {
            user: "alice".to_string(),
            action: action.to_string(),
            file_id: file_id.to_string(),
            details: serde_json::json!({"n": action.len()}),
        }
    }

    #[tokio::test]
    async fn test_create_returns_row() {
        let (_dir, repo) = setup().await;
        let row = repo.create(&entry("upload", "f1")).await.unwrap();
        assert_eq!(row.user, "alice");
        assert_eq!(row.action, "upload");
        assert_eq!(row.details["n"], 6);
    }

    #[tokio::test]
    async fn test_find_recent_filters_and_limits() {
        let (_dir, repo) = setup().await;
        repo.create(&entry("upload", "f1")).await.unwrap();
        repo.create(&entry("upload", "f2")).await.unwrap();
        repo.create(&entry("image_crop", "f1")).await.unwrap();
        repo.create(&entry("delete", "f1")).await.unwrap();

        let all = repo.find_recent(10, None).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].action, "delete");

        let f1 = repo.find_recent(2, Some("f1")).await.unwrap();
        assert_eq!(
            f1.iter().map(|e| e.action.as_str()).collect::<Vec<_>>(),
            ["delete", "image_crop"]
        );

        let uploads = all.iter().filter(|e| e.action == "upload").count();
        assert_eq!(uploads, 2);
    }
}
