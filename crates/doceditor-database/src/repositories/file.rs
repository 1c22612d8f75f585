//! File and version repository implementation.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use doceditor_core::error::{AppError, ErrorKind};
use doceditor_core::result::AppResult;
use doceditor_core::types::FileId;
use doceditor_entity::file::{File, FileVersion};

/// Repository for file metadata and the version chain.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a file by ID.
    pub async fn find_by_id(&self, file_id: FileId) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE file_id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::StorageFailure, "Failed to find file", e))
    }

    /// List every file, newest first.
    pub async fn find_all(&self) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files ORDER BY created_at DESC, rowid DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::StorageFailure, "Failed to list files", e)
            })
    }

    /// Open a write transaction on the version chain.
    ///
    /// The transaction starts with `BEGIN IMMEDIATE`, so it owns the
    /// database write lock until it ends and writers in every process that
    /// shares the database wait for it (up to the configured busy timeout).
    pub async fn begin_write(&self) -> AppResult<VersionTx> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(|e| {
            AppError::with_source(ErrorKind::StorageFailure, "Failed to begin write transaction", e)
        })?;
        Ok(VersionTx { tx })
    }

    /// All versions of a file in ascending order.
    pub async fn find_versions(&self, file_id: FileId) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT version, created_at, action, details FROM file_versions \
             WHERE file_id = ? ORDER BY version ASC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::StorageFailure, "Failed to list versions", e))
    }

    /// Delete a file; its versions cascade. Returns whether a row was removed.
    pub async fn delete(&self, file_id: FileId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE file_id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::StorageFailure, "Failed to delete file", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}

/// An open write transaction on the version chain.
///
/// Dropping it without [`VersionTx::commit`] rolls everything back.
pub struct VersionTx {
    tx: Transaction<'static, Sqlite>,
}

impl VersionTx {
    /// Find a file by ID inside the transaction.
    pub async fn find_file(&mut self, file_id: FileId) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE file_id = ?")
            .bind(file_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::StorageFailure, "Failed to find file", e))
    }

    /// Insert a file together with its version 0 row.
    ///
    /// An id collision surfaces as [`ErrorKind::DuplicateFile`].
    pub async fn insert_file(&mut self, file: &File, initial: &FileVersion) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO files (file_id, original_name, file_type, ext, created_at, current_version) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(file.file_id)
        .bind(&file.original_name)
        .bind(file.file_type)
        .bind(&file.ext)
        .bind(file.created_at)
        .bind(file.current_version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if duplicate {
                AppError::duplicate_file(format!("File {} already exists", file.file_id))
            } else {
                AppError::with_source(ErrorKind::StorageFailure, "Failed to create file", e)
            }
        })?;

        insert_version(&mut self.tx, file.file_id, initial).await
    }

    /// Append `version` and advance `current_version` from `expected`.
    ///
    /// The update only applies while `current_version` still equals
    /// `expected`; a stale expectation leaves the chain unchanged.
    pub async fn append_version(
        &mut self,
        file_id: FileId,
        expected: u32,
        version: &FileVersion,
    ) -> AppResult<()> {
        let updated = sqlx::query(
            "UPDATE files SET current_version = ? WHERE file_id = ? AND current_version = ?",
        )
        .bind(version.version)
        .bind(file_id)
        .bind(expected)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::StorageFailure, "Failed to advance version", e)
        })?
        .rows_affected();

        if updated == 0 {
            return Err(match self.find_file(file_id).await? {
                Some(_) => AppError::new(
                    ErrorKind::Internal,
                    format!("Version conflict on file {file_id}: expected version {expected}"),
                ),
                None => AppError::not_found(format!("File {file_id} not found")),
            });
        }

        insert_version(&mut self.tx, file_id, version).await
    }

    /// Commit the transaction and release the write lock.
    pub async fn commit(self) -> AppResult<()> {
        self.tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::StorageFailure, "Failed to commit transaction", e)
        })
    }

    /// Roll the transaction back and release the write lock.
    pub async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await.map_err(|e| {
            AppError::with_source(ErrorKind::StorageFailure, "Failed to roll back transaction", e)
        })
    }
}

async fn insert_version(
    tx: &mut Transaction<'static, Sqlite>,
    file_id: FileId,
    version: &FileVersion,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO file_versions (file_id, version, created_at, action, details) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(file_id)
    .bind(version.version)
    .bind(version.created_at)
    .bind(&version.action)
    .bind(&version.details)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::StorageFailure, "Failed to record version", e))?;
    Ok(())
}

/// Build the row for a new version stamped with the current time.
pub fn new_version(version: u32, action: &str, details: serde_json::Value) -> FileVersion {
    FileVersion {
        version,
        created_at: Utc::now(),
        action: action.to_string(),
        details,
    }
}
