//! Annotation layer service.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use doceditor_core::result::AppResult;
use doceditor_core::types::FileId;
use doceditor_database::repositories::AnnotationLayerRepository;
use doceditor_entity::annotation::{AnnotationLayer, TextOverlay};

use crate::audit::AuditService;
use crate::version::VersionManager;

/// Reads and edits the scratch layer each user keeps on a file.
///
/// Read-modify-write edits run under the file's commit lock.
#[derive(Debug, Clone)]
pub struct AnnotationService {
    /// Annotation layer repository.
    layer_repo: Arc<AnnotationLayerRepository>,
    /// Version manager, for existence checks and the file lock.
    versions: Arc<VersionManager>,
    /// Audit service.
    audit: Arc<AuditService>,
}

impl AnnotationService {
    /// Creates a new annotation service.
    pub fn new(
        layer_repo: Arc<AnnotationLayerRepository>,
        versions: Arc<VersionManager>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            layer_repo,
            versions,
            audit,
        }
    }

    /// The layer `user` keeps on a file; empty when never saved.
    pub async fn get_layer(&self, file_id: FileId, user: &str) -> AppResult<AnnotationLayer> {
        self.versions.file(file_id).await?;
        self.load(file_id, user).await
    }

    /// Every saved layer of a file.
    pub async fn list_layers(&self, file_id: FileId) -> AppResult<Vec<AnnotationLayer>> {
        self.versions.file(file_id).await?;
        self.layer_repo.find_by_file(file_id).await
    }

    /// Replace the layer `user` keeps on a file.
    pub async fn save_layer(
        &self,
        file_id: FileId,
        user: &str,
        layer: AnnotationLayer,
    ) -> AppResult<AnnotationLayer> {
        let _guard = self.versions.lock(file_id).await;
        self.versions.file(file_id).await?;
        self.store(file_id, user, layer).await
    }

    /// Drop the layer `user` keeps on a file. Returns whether one existed.
    pub async fn delete_layer(&self, file_id: FileId, user: &str) -> AppResult<bool> {
        self.versions.file(file_id).await?;
        let removed = self.layer_repo.delete(file_id, user).await?;
        if removed {
            info!(file_id = %file_id, user = %user, "Annotation layer deleted");
        }
        Ok(removed)
    }

    /// Drop every layer of a file.
    pub async fn delete_all(&self, file_id: FileId) -> AppResult<u64> {
        self.layer_repo.delete_by_file(file_id).await
    }

    /// Append a text overlay to the caller's layer.
    pub async fn add_text_overlay(
        &self,
        file_id: FileId,
        user: &str,
        overlay: TextOverlay,
    ) -> AppResult<AnnotationLayer> {
        let guard = self.versions.lock(file_id).await;
        self.versions.file(file_id).await?;

        let details = serde_json::json!({ "page": overlay.page, "text": overlay.text });
        let mut layer = self.load(file_id, user).await?;
        layer.text_overlays.push(overlay);
        let layer = self.store(file_id, user, layer).await?;
        drop(guard);

        self.audit
            .log(user, "pdf_text_overlay", Some(file_id), details)
            .await;
        Ok(layer)
    }

    /// Replace the canvas JSON of one page in the caller's layer.
    pub async fn set_fabric_page(
        &self,
        file_id: FileId,
        user: &str,
        page: u32,
        canvas: serde_json::Value,
    ) -> AppResult<AnnotationLayer> {
        let guard = self.versions.lock(file_id).await;
        self.versions.file(file_id).await?;

        let mut layer = self.load(file_id, user).await?;
        layer.fabric_pages.insert(page, canvas);
        let layer = self.store(file_id, user, layer).await?;
        drop(guard);

        self.audit
            .log(user, "pdf_annotate", Some(file_id), serde_json::json!({ "page": page }))
            .await;
        Ok(layer)
    }

    async fn load(&self, file_id: FileId, user: &str) -> AppResult<AnnotationLayer> {
        Ok(self
            .layer_repo
            .find(file_id, user)
            .await?
            .unwrap_or_else(|| AnnotationLayer::empty(user)))
    }

    async fn store(
        &self,
        file_id: FileId,
        user: &str,
        mut layer: AnnotationLayer,
    ) -> AppResult<AnnotationLayer> {
        layer.user = user.to_string();
        layer.updated_at = Some(Utc::now());
        self.layer_repo.upsert(file_id, &layer).await?;
        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::testing::TestContext;
    use doceditor_core::error::ErrorKind;
    use doceditor_entity::file::FileType;

    fn overlay(page: u32, text: &str) -> TextOverlay {
        TextOverlay {
            page,
            text: text.to_string(),
            x: 10.0,
            y: 20.0,
            font_size: 12.0,
            font_name: "Helvetica".to_string(),
            color: [0.0, 0.0, 0.0],
        }
    }

    async fn pdf_file(ctx: &TestContext) -> FileId {
        ctx.state
            .versions
            .import("a.pdf", FileType::Pdf, "pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap()
            .file
            .file_id
    }

    #[tokio::test]
    async fn test_missing_layer_reads_empty() {
        let ctx = TestContext::new().await;
        let id = pdf_file(&ctx).await;

        let layer = ctx.state.annotations.get_layer(id, "ann").await.unwrap();
        assert_eq!(layer.user, "ann");
        assert!(layer.is_empty());
        assert!(ctx.state.annotations.list_layers(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edits_accumulate_per_user() {
        let ctx = TestContext::new().await;
        let annotations = &ctx.state.annotations;
        let id = pdf_file(&ctx).await;

        annotations
            .add_text_overlay(id, "ann", overlay(0, "first"))
            .await
            .unwrap();
        annotations
            .add_text_overlay(id, "ann", overlay(1, "second"))
            .await
            .unwrap();
        annotations
            .set_fabric_page(id, "bob", 2, serde_json::json!({"objects": []}))
            .await
            .unwrap();

        let ann = annotations.get_layer(id, "ann").await.unwrap();
        assert_eq!(ann.text_overlays.len(), 2);
        assert!(ann.updated_at.is_some());

        let layers = annotations.list_layers(id).await.unwrap();
        let users: Vec<&str> = layers.iter().map(|l| l.user.as_str()).collect();
        assert_eq!(users, vec!["ann", "bob"]);

        let audit = ctx.state.audit.recent(None, Some(id)).await.unwrap();
        let actions: Vec<&str> = audit.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["pdf_text_overlay", "pdf_text_overlay", "pdf_annotate"]);
    }

    #[tokio::test]
    async fn test_save_and_delete_layer() {
        let ctx = TestContext::new().await;
        let annotations = &ctx.state.annotations;
        let id = pdf_file(&ctx).await;

        let mut layer = AnnotationLayer::empty("someone-else");
        layer.text_overlays.push(overlay(0, "saved"));
        let saved = annotations.save_layer(id, "ann", layer).await.unwrap();
        assert_eq!(saved.user, "ann");

        assert!(annotations.delete_layer(id, "ann").await.unwrap());
        assert!(!annotations.delete_layer(id, "ann").await.unwrap());
        assert!(annotations.get_layer(id, "ann").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_file_is_not_found() {
        let ctx = TestContext::new().await;
        let err = ctx
            .state
            .annotations
            .add_text_overlay(FileId::new(), "ann", overlay(0, "x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
