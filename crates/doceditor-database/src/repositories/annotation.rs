//! Annotation layer repository implementation.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use doceditor_core::error::{AppError, ErrorKind};
use doceditor_core::result::AppResult;
use doceditor_core::types::FileId;
use doceditor_entity::annotation::AnnotationLayer;

/// Repository for per-(file, user) annotation layer documents.
#[derive(Debug, Clone)]
pub struct AnnotationLayerRepository {
    pool: SqlitePool,
}

impl AnnotationLayerRepository {
    /// Create a new annotation layer repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find the layer `user` keeps on `file_id`.
    pub async fn find(&self, file_id: FileId, user: &str) -> AppResult<Option<AnnotationLayer>> {
        let document: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT document FROM annotation_layers WHERE file_id = ? AND user_name = ?",
        )
        .bind(file_id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::StorageFailure, "Failed to find annotation layer", e)
        })?;

        document.map(decode_layer).transpose()
    }

    /// All layers of a file ordered by user.
    pub async fn find_by_file(&self, file_id: FileId) -> AppResult<Vec<AnnotationLayer>> {
        let documents: Vec<serde_json::Value> = sqlx::query_scalar(
            "SELECT document FROM annotation_layers WHERE file_id = ? ORDER BY user_name ASC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::StorageFailure, "Failed to list annotation layers", e)
        })?;

        documents.into_iter().map(decode_layer).collect()
    }

    /// Insert or replace a layer. `layer.user` and `layer.updated_at` must
    /// already be set by the caller.
    pub async fn upsert(&self, file_id: FileId, layer: &AnnotationLayer) -> AppResult<()> {
        let document = serde_json::to_value(layer)?;
        let updated_at: DateTime<Utc> = layer.updated_at.unwrap_or_else(Utc::now);

        sqlx::query(
            "INSERT INTO annotation_layers (file_id, user_name, document, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (file_id, user_name) DO UPDATE SET \
             document = excluded.document, updated_at = excluded.updated_at",
        )
        .bind(file_id)
        .bind(&layer.user)
        .bind(&document)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::StorageFailure, "Failed to save annotation layer", e)
        })?;
        Ok(())
    }

    /// Delete one layer. Returns whether it existed.
    pub async fn delete(&self, file_id: FileId, user: &str) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM annotation_layers WHERE file_id = ? AND user_name = ?")
                .bind(file_id)
                .bind(user)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::StorageFailure,
                        "Failed to delete annotation layer",
                        e,
                    )
                })?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every layer of a file. Returns how many were removed.
    pub async fn delete_by_file(&self, file_id: FileId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM annotation_layers WHERE file_id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::StorageFailure,
                    "Failed to delete annotation layers",
                    e,
                )
            })?;
        Ok(result.rows_affected())
    }
}

fn decode_layer(document: serde_json::Value) -> AppResult<AnnotationLayer> {
    Ok(serde_json::from_value(document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::run_migrations;
    use crate::repositories::file::{new_version, FileRepository};
    use crate::DatabasePool;
    use doceditor_core::config::DatabaseConfig;
    use doceditor_entity::annotation::TextOverlay;
    use doceditor_entity::file::{File, FileType};

    async fn setup() -> (tempfile::TempDir, AnnotationLayerRepository, FileId) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("layers.db").display()),
            ..DatabaseConfig::default()
        };
        let db = DatabasePool::connect(&config).await.unwrap();
        run_migrations(db.pool()).await.unwrap();

        let file = File {
            file_id: FileId::new(),
            original_name: "doc.pdf".to_string(),
            file_type: FileType::Pdf,
            ext: "pdf".to_string(),
            created_at: Utc::now(),
            current_version: 0,
        };
        let mut tx = FileRepository::new(db.pool().clone())
            .begin_write()
            .await
            .unwrap();
        tx.insert_file(&file, &new_version(0, "upload", serde_json::json!({})))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        (
            dir,
            AnnotationLayerRepository::new(db.pool().clone()),
            file.file_id,
        )
    }

    fn layer(user: &str, text: &str) -> AnnotationLayer {
        AnnotationLayer {
            user: user.to_string(),
            updated_at: Some(Utc::now()),
            text_overlays: vec![TextOverlay {
                page: 0,
                text: text.to_string(),
                x: 10.0,
                y: 20.0,
                font_size: 12.0,
                font_name: "Helvetica".to_string(),
                color: [0.0, 0.0, 0.0],
            }],
            ..AnnotationLayer::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_document() {
        let (_dir, repo, file_id) = setup().await;
        repo.upsert(file_id, &layer("ann", "first")).await.unwrap();
        repo.upsert(file_id, &layer("ann", "second")).await.unwrap();

        let found = repo.find(file_id, "ann").await.unwrap().unwrap();
        assert_eq!(found.text_overlays.len(), 1);
        assert_eq!(found.text_overlays[0].text, "second");
        assert!(repo.find(file_id, "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_by_file() {
        let (_dir, repo, file_id) = setup().await;
        repo.upsert(file_id, &layer("bob", "b")).await.unwrap();
        repo.upsert(file_id, &layer("ann", "a")).await.unwrap();

        let users: Vec<_> = repo
            .find_by_file(file_id)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.user)
            .collect();
        assert_eq!(users, ["ann", "bob"]);

        assert!(repo.delete(file_id, "ann").await.unwrap());
        assert!(!repo.delete(file_id, "ann").await.unwrap());
        assert_eq!(repo.delete_by_file(file_id).await.unwrap(), 1);
        assert!(repo.find_by_file(file_id).await.unwrap().is_empty());
    }
}
