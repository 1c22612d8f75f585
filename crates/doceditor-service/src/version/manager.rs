//! The append-only version chain of every file.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use doceditor_core::error::AppError;
use doceditor_core::result::AppResult;
use doceditor_core::types::{FileId, VersionRef};
use doceditor_database::repositories::{FileRepository, VersionTx};
use doceditor_database::repositories::file::new_version;
use doceditor_entity::file::{File, FileRecord, FileType, FileVersion};
use doceditor_storage::{BlobHandle, BlobStore};

/// Exclusive hold on one file's version chain.
///
/// Obtained from [`VersionManager::lock`]; released on drop.
#[derive(Debug)]
pub struct FileGuard {
    file_id: FileId,
    _guard: OwnedMutexGuard<()>,
}

impl FileGuard {
    /// The locked file.
    pub fn file_id(&self) -> FileId {
        self.file_id
    }
}

/// Owns the invariant that every mutation is a new, contiguous version.
///
/// Blobs are written before metadata, so only versions whose blob is
/// already on disk ever become visible. The per-file mutex orders edits
/// inside one process; the chain write transaction orders commits across
/// every process sharing the database.
#[derive(Debug)]
pub struct VersionManager {
    file_repo: Arc<FileRepository>,
    blobs: Arc<BlobStore>,
    locks: DashMap<FileId, Arc<Mutex<()>>>,
}

impl VersionManager {
    /// Creates a new version manager.
    pub fn new(file_repo: Arc<FileRepository>, blobs: Arc<BlobStore>) -> Self {
        Self {
            file_repo,
            blobs,
            locks: DashMap::new(),
        }
    }

    /// The blob store the chain lives in.
    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    /// Take the per-file commit lock.
    pub async fn lock(&self, file_id: FileId) -> FileGuard {
        let mutex = self.locks.entry(file_id).or_default().value().clone();
        FileGuard {
            file_id,
            _guard: mutex.lock_owned().await,
        }
    }

    pub(crate) fn file_repo(&self) -> &FileRepository {
        &self.file_repo
    }

    pub(crate) fn forget_lock(&self, file_id: FileId) {
        self.locks.remove(&file_id);
    }

    /// Load a file, failing with `NotFound` when it is unknown.
    pub async fn file(&self, file_id: FileId) -> AppResult<File> {
        self.file_repo
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Load a file, returning `None` when it is unknown.
    pub async fn find_file(&self, file_id: FileId) -> AppResult<Option<File>> {
        self.file_repo.find_by_id(file_id).await
    }

    /// A file together with its version list.
    pub async fn record(&self, file_id: FileId) -> AppResult<FileRecord> {
        let file = self.file(file_id).await?;
        let versions = self.file_repo.find_versions(file_id).await?;
        Ok(FileRecord { file, versions })
    }

    /// Every file with its versions, newest file first.
    pub async fn records(&self) -> AppResult<Vec<FileRecord>> {
        let files = self.file_repo.find_all().await?;
        let mut records = Vec::with_capacity(files.len());
        for file in files {
            let versions = self.file_repo.find_versions(file.file_id).await?;
            records.push(FileRecord { file, versions });
        }
        Ok(records)
    }

    /// Register version 0 of a file whose original blob is already stored.
    pub async fn create(
        &self,
        file_id: FileId,
        original_name: &str,
        file_type: FileType,
        ext: &str,
    ) -> AppResult<FileRecord> {
        let mut tx = self.file_repo.begin_write().await?;
        let record = register(&mut tx, file_id, original_name, file_type, ext).await?;
        tx.commit().await?;
        log_created(&record.file);
        Ok(record)
    }

    /// Store `data` as the original blob of a fresh file and register it.
    ///
    /// The blob is written while the chain write transaction is open, so a
    /// concurrent sweep never sees it without its metadata. It is removed
    /// again if registration fails.
    pub async fn import(
        &self,
        original_name: &str,
        file_type: FileType,
        ext: &str,
        data: Bytes,
    ) -> AppResult<FileRecord> {
        let file_id = FileId::new();

        let mut tx = self.file_repo.begin_write().await?;
        let handle = self.blobs.write(file_id, ext, 0, data).await?;

        // The id is fresh, so the original key belongs to this call alone.
        let registered = match register(&mut tx, file_id, original_name, file_type, ext).await {
            Ok(record) => tx.commit().await.map(|()| record),
            Err(e) => Err(e),
        };
        match registered {
            Ok(record) => {
                log_created(&record.file);
                Ok(record)
            }
            Err(e) => {
                self.discard(&handle).await;
                Err(e)
            }
        }
    }

    /// The newest committed version number.
    pub async fn current_version(&self, file_id: FileId) -> AppResult<u32> {
        Ok(self.file(file_id).await?.current_version)
    }

    /// Locate the blob of a committed version.
    pub async fn resolve(&self, file_id: FileId, version: VersionRef) -> AppResult<BlobHandle> {
        let file = self.file(file_id).await?;
        Self::resolve_in(&file, version)
    }

    fn resolve_in(file: &File, version: VersionRef) -> AppResult<BlobHandle> {
        let number = match version {
            VersionRef::Latest => file.current_version,
            VersionRef::Number(n) if n <= file.current_version => n,
            VersionRef::Number(n) => {
                return Err(AppError::not_found(format!(
                    "Version {n} of file {} not found",
                    file.file_id
                )));
            }
        };
        Ok(BlobStore::handle(file.file_id, &file.ext, number))
    }

    /// Read the bytes of one version.
    pub async fn read(&self, file_id: FileId, version: VersionRef) -> AppResult<(File, Bytes)> {
        let file = self.file(file_id).await?;
        let handle = Self::resolve_in(&file, version)?;
        let data = self.blobs.read(&handle).await?;
        Ok((file, data))
    }

    /// Commit `data` as the next version, taking the file lock for the
    /// duration of the commit. Returns the new version number.
    pub async fn commit(
        &self,
        file_id: FileId,
        data: Bytes,
        action: &str,
        details: serde_json::Value,
    ) -> AppResult<u32> {
        let guard = self.lock(file_id).await;
        self.commit_locked(&guard, data, action, details).await
    }

    /// Commit `data` as the next version under a lock the caller holds.
    ///
    /// The version number is read, the blob written and the metadata
    /// appended inside one chain write transaction. Writers in other
    /// processes wait on the database lock, so no two commits ever target
    /// the same blob key.
    pub async fn commit_locked(
        &self,
        guard: &FileGuard,
        data: Bytes,
        action: &str,
        details: serde_json::Value,
    ) -> AppResult<u32> {
        let mut tx = self.file_repo.begin_write().await?;
        let file = tx
            .find_file(guard.file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {} not found", guard.file_id)))?;
        let expected = file.current_version;
        let next = expected + 1;

        let handle = self.blobs.write(file.file_id, &file.ext, next, data).await?;
        let row = new_version(next, action, details);

        if let Err(e) = tx.append_version(file.file_id, expected, &row).await {
            // Still inside the transaction: nobody else can own this key.
            self.discard(&handle).await;
            return Err(e);
        }
        if let Err(e) = tx.commit().await {
            // The lock is gone; the key may already be reused, so the blob
            // is left for the next commit to overwrite or the sweep to drop.
            warn!(path = %handle.path, error = %e, "Version commit failed after blob write");
            return Err(e);
        }

        info!(file_id = %file.file_id, version = next, action = %action, "Version committed");
        Ok(next)
    }

    /// Commit the bytes of `target` again as a new version.
    pub async fn revert(&self, file_id: FileId, target: u32) -> AppResult<u32> {
        let guard = self.lock(file_id).await;
        self.restore_locked(
            &guard,
            target,
            "revert",
            serde_json::json!({ "reverted_to": target }),
        )
        .await
    }

    /// Copy an earlier version forward under a held lock.
    pub async fn restore_locked(
        &self,
        guard: &FileGuard,
        target: u32,
        action: &str,
        details: serde_json::Value,
    ) -> AppResult<u32> {
        let (_, data) = self.read(guard.file_id, VersionRef::Number(target)).await?;
        self.commit_locked(guard, data, action, details).await
    }

    /// Remove a file, all of its versions and all of its blobs.
    ///
    /// Returns whether the file existed; deleting an unknown file does
    /// nothing.
    pub async fn delete(&self, file_id: FileId) -> AppResult<bool> {
        let guard = self.lock(file_id).await;

        let Some(file) = self.file_repo.find_by_id(file_id).await? else {
            drop(guard);
            self.forget_lock(file_id);
            return Ok(false);
        };

        self.file_repo.delete(file_id).await?;
        self.blobs.remove_all(file_id, &file.ext).await?;

        drop(guard);
        self.forget_lock(file_id);

        info!(file_id = %file_id, versions = file.current_version + 1, "File deleted");
        Ok(true)
    }

    /// All versions of a file, oldest first.
    pub async fn list_versions(&self, file_id: FileId) -> AppResult<Vec<FileVersion>> {
        self.file(file_id).await?;
        self.file_repo.find_versions(file_id).await
    }

    async fn discard(&self, handle: &BlobHandle) {
        match self.blobs.remove(handle).await {
            Ok(()) => debug!(path = %handle.path, "Discarded uncommitted blob"),
            Err(e) => warn!(path = %handle.path, error = %e, "Failed to discard uncommitted blob"),
        }
    }
}

async fn register(
    tx: &mut VersionTx,
    file_id: FileId,
    original_name: &str,
    file_type: FileType,
    ext: &str,
) -> AppResult<FileRecord> {
    let file = File {
        file_id,
        original_name: original_name.to_string(),
        file_type,
        ext: ext.to_string(),
        created_at: Utc::now(),
        current_version: 0,
    };
    let initial = new_version(0, "upload", serde_json::json!({}));
    tx.insert_file(&file, &initial).await?;
    Ok(FileRecord {
        file,
        versions: vec![initial],
    })
}

fn log_created(file: &File) {
    info!(
        file_id = %file.file_id,
        file_type = %file.file_type,
        original_name = %file.original_name,
        "File created"
    );
}
