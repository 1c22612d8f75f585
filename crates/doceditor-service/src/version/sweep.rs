//! Removal of blobs stranded by an interrupted commit.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use doceditor_core::result::AppResult;
use doceditor_core::types::FileId;
use doceditor_storage::BlobStore;
use doceditor_storage::blob::StoredBlob;

use super::manager::VersionManager;

/// Outcome of [`VersionManager::sweep_orphans`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Storage keys that were removed.
    pub removed: Vec<String>,
    /// Committed versions whose blob is gone.
    pub missing: Vec<MissingBlob>,
}

/// A committed version without a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingBlob {
    /// The file.
    pub file_id: FileId,
    /// The version whose blob is absent.
    pub version: u32,
}

impl VersionManager {
    /// Delete blobs no committed version refers to and report committed
    /// versions whose blob is missing.
    ///
    /// Each file is inspected inside a chain write transaction, which
    /// excludes commits and imports in every process sharing the database.
    pub async fn sweep_orphans(&self) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        let mut by_file: BTreeMap<String, Vec<StoredBlob>> = BTreeMap::new();
        for blob in self.blobs().scan().await? {
            by_file.entry(blob.file_key.clone()).or_default().push(blob);
        }

        for (key, blobs) in by_file {
            let Ok(file_id) = key.parse::<FileId>() else {
                for blob in &blobs {
                    self.blobs().remove_stored(blob).await?;
                    report.removed.push(blob.path.clone());
                }
                continue;
            };

            // Inspect and prune under the chain write lock, so blobs of
            // commits in flight in any process are never touched.
            let mut tx = self.file_repo().begin_write().await?;
            let file = tx.find_file(file_id).await?;

            for blob in &blobs {
                let referenced = file.as_ref().is_some_and(|f| {
                    blob.version <= f.current_version
                        && blob.path == BlobStore::blob_path(file_id, &f.ext, blob.version)
                });
                if !referenced {
                    self.blobs().remove_stored(blob).await?;
                    report.removed.push(blob.path.clone());
                }
            }
            tx.rollback().await?;

            if file.is_none() {
                self.forget_lock(file_id);
            }
        }

        for record in self.records().await? {
            let file = &record.file;
            for version in 0..=file.current_version {
                let handle = BlobStore::handle(file.file_id, &file.ext, version);
                if !self.blobs().exists(&handle).await? {
                    warn!(file_id = %file.file_id, version, "Committed version has no blob");
                    report.missing.push(MissingBlob {
                        file_id: file.file_id,
                        version,
                    });
                }
            }
        }

        info!(
            removed = report.removed.len(),
            missing = report.missing.len(),
            "Orphan sweep finished"
        );
        Ok(report)
    }
}
