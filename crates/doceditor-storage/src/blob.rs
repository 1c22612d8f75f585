//! Version blob layout on top of a [`StorageProvider`].
//!
//! Version 0 lives at `originals/{file_id}.{ext}`; version `n > 0` lives at
//! `versions/{file_id}/v{n}.{ext}`. Each key is written once.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use doceditor_core::result::AppResult;
use doceditor_core::traits::storage::StorageProvider;
use doceditor_core::types::FileId;

const ORIGINALS_DIR: &str = "originals";
const VERSIONS_DIR: &str = "versions";

/// Location of one committed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    /// Owning file.
    pub file_id: FileId,
    /// Version the blob belongs to.
    pub version: u32,
    /// Storage key.
    pub path: String,
}

/// A blob key found in storage, as reported by the orphan scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Storage key.
    pub path: String,
    /// Owning file id as found in the key. May not parse as a [`FileId`].
    pub file_key: String,
    /// Version encoded in the key.
    pub version: u32,
}

/// Maps (file, version) pairs to storage keys and moves bytes in and out.
#[derive(Debug, Clone)]
pub struct BlobStore {
    provider: Arc<dyn StorageProvider>,
}

impl BlobStore {
    /// Create a blob store over the given provider.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// Storage key for one version.
    pub fn blob_path(file_id: FileId, ext: &str, version: u32) -> String {
        if version == 0 {
            format!("{ORIGINALS_DIR}/{file_id}.{ext}")
        } else {
            format!("{VERSIONS_DIR}/{file_id}/v{version}.{ext}")
        }
    }

    /// Handle for one version without touching storage.
    pub fn handle(file_id: FileId, ext: &str, version: u32) -> BlobHandle {
        BlobHandle {
            file_id,
            version,
            path: Self::blob_path(file_id, ext, version),
        }
    }

    /// Atomically write the blob of one version.
    pub async fn write(
        &self,
        file_id: FileId,
        ext: &str,
        version: u32,
        data: Bytes,
    ) -> AppResult<BlobHandle> {
        let handle = Self::handle(file_id, ext, version);
        self.provider.write(&handle.path, data).await?;
        debug!(file_id = %file_id, version, path = %handle.path, "Stored version blob");
        Ok(handle)
    }

    /// Read the bytes behind a handle.
    pub async fn read(&self, handle: &BlobHandle) -> AppResult<Bytes> {
        self.provider.read_bytes(&handle.path).await
    }

    /// Whether the blob behind a handle exists.
    pub async fn exists(&self, handle: &BlobHandle) -> AppResult<bool> {
        self.provider.exists(&handle.path).await
    }

    /// Remove one version's blob. Missing blobs are ignored.
    pub async fn remove(&self, handle: &BlobHandle) -> AppResult<()> {
        self.provider.delete(&handle.path).await
    }

    /// Remove every blob of a file.
    pub async fn remove_all(&self, file_id: FileId, ext: &str) -> AppResult<()> {
        self.provider
            .delete(&Self::blob_path(file_id, ext, 0))
            .await?;
        self.provider
            .delete_dir(&format!("{VERSIONS_DIR}/{file_id}"))
            .await?;
        debug!(file_id = %file_id, "Removed all blobs");
        Ok(())
    }

    /// Every blob key in storage that follows the layout.
    ///
    /// Entries that do not match the layout are skipped.
    pub async fn scan(&self) -> AppResult<Vec<StoredBlob>> {
        let mut found = Vec::new();

        for entry in self.provider.list(ORIGINALS_DIR).await? {
            if entry.is_directory {
                continue;
            }
            if let Some((stem, _)) = file_name(&entry.path).rsplit_once('.') {
                found.push(StoredBlob {
                    file_key: stem.to_string(),
                    version: 0,
                    path: entry.path.clone(),
                });
            }
        }

        for dir in self.provider.list(VERSIONS_DIR).await? {
            if !dir.is_directory {
                continue;
            }
            let file_key = file_name(&dir.path).to_string();
            for entry in self.provider.list(&dir.path).await? {
                if let Some(version) = parse_version_name(file_name(&entry.path)) {
                    found.push(StoredBlob {
                        path: entry.path.clone(),
                        file_key: file_key.clone(),
                        version,
                    });
                }
            }
        }

        Ok(found)
    }

    /// Remove a blob found by [`BlobStore::scan`], and its version
    /// directory once empty.
    pub async fn remove_stored(&self, blob: &StoredBlob) -> AppResult<()> {
        self.provider.delete(&blob.path).await?;
        if blob.version > 0 {
            let dir = format!("{VERSIONS_DIR}/{}", blob.file_key);
            if self.provider.list(&dir).await?.is_empty() {
                self.provider.delete_dir(&dir).await?;
            }
        }
        Ok(())
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parse `v{n}.{ext}` into `n`.
fn parse_version_name(name: &str) -> Option<u32> {
    let (stem, _ext) = name.rsplit_once('.')?;
    stem.strip_prefix('v')?.parse().ok()
}
