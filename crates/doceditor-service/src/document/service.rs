//! Document service: uploads, single-file edits, history and audit reads.

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use doceditor_core::config::EditorConfig;
use doceditor_core::error::{AppError, ErrorKind};
use doceditor_core::result::AppResult;
use doceditor_core::types::{FileId, VersionRef};
use doceditor_entity::audit::AuditLogEntry;
use doceditor_entity::file::{File, FileRecord, FileType, FileVersion};
use doceditor_transform::EditOperation;

use crate::annotation::AnnotationService;
use crate::audit::AuditService;
use crate::version::VersionManager;

/// Entry point for every document operation.
///
/// Each state change takes the file lock, runs its transform on a blocking
/// worker, commits and then writes one audit entry.
#[derive(Debug, Clone)]
pub struct DocumentService {
    /// Upload and request rules.
    pub(crate) editor: EditorConfig,
    /// Upload size cap in bytes.
    pub(crate) max_upload_size: u64,
    /// Version manager.
    pub(crate) versions: Arc<VersionManager>,
    /// Annotation layers.
    pub(crate) annotations: Arc<AnnotationService>,
    /// Audit trail.
    pub(crate) audit: Arc<AuditService>,
}

impl DocumentService {
    /// Creates a new document service.
    pub fn new(
        editor: EditorConfig,
        max_upload_size: u64,
        versions: Arc<VersionManager>,
        annotations: Arc<AnnotationService>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            editor,
            max_upload_size,
            versions,
            annotations,
            audit,
        }
    }

    /// Store an uploaded file as version 0 of a new document.
    pub async fn upload(&self, filename: &str, data: Bytes, user: &str) -> AppResult<FileRecord> {
        let name = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename)
            .trim();
        if name.is_empty() {
            return Err(AppError::invalid_operation("File name cannot be empty"));
        }

        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let file_type = self.classify(&ext)?;

        if data.len() as u64 > self.max_upload_size {
            return Err(AppError::invalid_operation(format!(
                "File size {} exceeds maximum allowed size of {} bytes",
                data.len(),
                self.max_upload_size
            )));
        }

        let size = data.len();
        let record = self.versions.import(name, file_type, &ext, data).await?;
        let file_id = record.file.file_id;

        info!(file_id = %file_id, name = %name, size, user = %user, "File uploaded");
        self.audit
            .log(
                user,
                "upload",
                Some(file_id),
                serde_json::json!({ "original_name": name }),
            )
            .await;

        Ok(record)
    }

    fn classify(&self, ext: &str) -> AppResult<FileType> {
        if self.editor.is_pdf_extension(ext) {
            Ok(FileType::Pdf)
        } else if self.editor.is_image_extension(ext) {
            Ok(FileType::Image)
        } else {
            Err(AppError::unsupported_type(format!(
                "File type .{ext} not allowed"
            )))
        }
    }

    /// A file with its version history.
    pub async fn get_file(&self, file_id: FileId) -> AppResult<FileRecord> {
        self.versions.record(file_id).await
    }

    /// Every file, newest first.
    pub async fn list_files(&self) -> AppResult<Vec<FileRecord>> {
        self.versions.records().await
    }

    /// Delete a file with all its versions and annotation layers.
    ///
    /// Unknown files are not an error; the request is audited either way.
    pub async fn delete_file(&self, file_id: FileId, user: &str) -> AppResult<bool> {
        let existed = self.versions.delete(file_id).await?;
        self.audit
            .log(user, "delete", Some(file_id), serde_json::json!({}))
            .await;
        Ok(existed)
    }

    /// Bytes of one version, latest when `version` is [`VersionRef::Latest`].
    pub async fn download(&self, file_id: FileId, version: VersionRef) -> AppResult<(File, Bytes)> {
        self.versions.read(file_id, version).await
    }

    /// Apply a structural edit to the latest version and commit the result.
    ///
    /// Returns the new version number. Nothing is committed when the
    /// transform fails.
    pub async fn mutate(&self, file_id: FileId, op: EditOperation, user: &str) -> AppResult<u32> {
        let guard = self.versions.lock(file_id).await;

        let (file, source) = self.versions.read(file_id, VersionRef::Latest).await?;
        op.check_target(file.file_type)?;

        let action = op.action();
        let details = op.details();
        let ext = file.ext.clone();
        let transform = op.clone();
        let output = run_blocking(move || transform.apply(&source, &ext)).await?;

        let version = self
            .versions
            .commit_locked(&guard, Bytes::from(output), action, details.clone())
            .await?;
        drop(guard);

        self.audit.log(user, action, Some(file_id), details).await;
        Ok(version)
    }

    /// All versions of a file, oldest first.
    pub async fn list_versions(&self, file_id: FileId) -> AppResult<Vec<FileVersion>> {
        self.versions.list_versions(file_id).await
    }

    /// Commit the bytes of an earlier version as the newest one.
    pub async fn revert(&self, file_id: FileId, target: u32, user: &str) -> AppResult<u32> {
        let version = self.versions.revert(file_id, target).await?;
        self.audit
            .log(
                user,
                "revert",
                Some(file_id),
                serde_json::json!({ "reverted_to": target, "version": version }),
            )
            .await;
        Ok(version)
    }

    /// Recent audit entries, oldest first.
    pub async fn get_audit_log(
        &self,
        limit: Option<u32>,
        file_id: Option<FileId>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.audit.recent(limit, file_id).await
    }

    /// Label recorded when the caller names no user.
    pub fn default_user(&self) -> &str {
        &self.editor.default_user
    }
}

/// Run CPU-bound work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Transform task failed", e))?
}
