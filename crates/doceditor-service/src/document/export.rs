//! Baking annotation layers into PDF content, and resets.

use bytes::Bytes;
use tracing::info;

use doceditor_core::error::AppError;
use doceditor_core::result::AppResult;
use doceditor_core::types::{FileId, VersionRef};
use doceditor_entity::annotation::{FabricOverlay, TextOverlay};
use doceditor_entity::file::{File, FileType};
use doceditor_transform::{overlay, pdf};

use super::service::{DocumentService, run_blocking};

impl DocumentService {
    /// Number of pages in the latest version of a PDF.
    pub async fn page_count(&self, file_id: FileId) -> AppResult<u32> {
        let (file, data) = self.versions.read(file_id, VersionRef::Latest).await?;
        require_pdf(&file)?;
        run_blocking(move || pdf::page_count(&data)).await
    }

    /// Render the text overlays of `users` plus client-rendered page PNGs
    /// onto the latest version, without committing anything.
    pub async fn export_annotated(
        &self,
        file_id: FileId,
        users: &[String],
        fabric_overlays: &[FabricOverlay],
    ) -> AppResult<(File, Bytes)> {
        let (file, data) = self.versions.read(file_id, VersionRef::Latest).await?;
        require_pdf(&file)?;

        let texts = self.collect_text_overlays(file_id, users).await?;
        let rendered = render(data, texts, fabric_overlays.to_vec()).await?;

        info!(file_id = %file_id, users = users.len(), "Annotated export rendered");
        Ok((file, Bytes::from(rendered)))
    }

    /// Render like [`DocumentService::export_annotated`] and commit the
    /// result as a new version. The layers themselves are kept.
    pub async fn flatten_annotations(
        &self,
        file_id: FileId,
        users: &[String],
        fabric_overlays: &[FabricOverlay],
        user: &str,
    ) -> AppResult<u32> {
        let guard = self.versions.lock(file_id).await;

        let (file, data) = self.versions.read(file_id, VersionRef::Latest).await?;
        require_pdf(&file)?;

        let texts = self.collect_text_overlays(file_id, users).await?;
        let details = serde_json::json!({
            "users": users,
            "text_overlays": texts.len(),
            "fabric_pages": fabric_overlays.iter().map(|o| o.page).collect::<Vec<_>>(),
        });
        let rendered = render(data, texts, fabric_overlays.to_vec()).await?;

        let version = self
            .versions
            .commit_locked(&guard, Bytes::from(rendered), "annotations_flatten", details.clone())
            .await?;
        drop(guard);

        self.audit
            .log(user, "annotations_flatten", Some(file_id), details)
            .await;
        Ok(version)
    }

    /// Commit the original upload as the newest version and drop every
    /// annotation layer of the file.
    pub async fn reset_to_original(&self, file_id: FileId, user: &str) -> AppResult<u32> {
        let guard = self.versions.lock(file_id).await;

        let details = serde_json::json!({ "reverted_to": 0 });
        let version = self
            .versions
            .restore_locked(&guard, 0, "reset_to_original", details.clone())
            .await?;
        let layers = self.annotations.delete_all(file_id).await?;
        drop(guard);

        info!(file_id = %file_id, version, layers, "File reset to original");
        self.audit
            .log(user, "reset_to_original", Some(file_id), details)
            .await;
        Ok(version)
    }

    async fn collect_text_overlays(
        &self,
        file_id: FileId,
        users: &[String],
    ) -> AppResult<Vec<TextOverlay>> {
        let mut texts = Vec::new();
        for user in users {
            let layer = self.annotations.get_layer(file_id, user).await?;
            texts.extend(layer.text_overlays);
        }
        Ok(texts)
    }
}

fn require_pdf(file: &File) -> AppResult<()> {
    if file.file_type == FileType::Pdf {
        Ok(())
    } else {
        Err(AppError::invalid_operation(format!(
            "File {} is not a PDF",
            file.file_id
        )))
    }
}

async fn render(
    data: Bytes,
    texts: Vec<TextOverlay>,
    fabric_overlays: Vec<FabricOverlay>,
) -> AppResult<Vec<u8>> {
    run_blocking(move || {
        let images = fabric_overlays
            .iter()
            .map(|o| {
                Ok(pdf::PageImage {
                    page: o.page,
                    image: overlay::decode_overlay_image(&o.png)?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        pdf::apply_overlays(&data, &texts, &images)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestContext, png_bytes};
    use doceditor_core::error::ErrorKind;
    use doceditor_transform::EditOperation;

    fn text(page: u32, body: &str) -> TextOverlay {
        TextOverlay {
            page,
            text: body.to_string(),
            x: 50.0,
            y: 60.0,
            font_size: 14.0,
            font_name: "Helvetica".to_string(),
            color: [0.0, 0.0, 1.0],
        }
    }

    #[tokio::test]
    async fn test_export_does_not_commit() {
        let ctx = TestContext::new().await;
        let docs = &ctx.state.documents;
        let id = ctx.upload_pdf(&[200, 100]).await;

        ctx.state
            .annotations
            .add_text_overlay(id, "ann", text(0, "Approved"))
            .await
            .unwrap();

        let fabric = vec![FabricOverlay {
            page: 1,
            user: Some("ann".to_string()),
            png: overlay::png_data_url(&png_bytes(10, 10)),
        }];
        let (file, exported) = docs
            .export_annotated(id, &["ann".to_string()], &fabric)
            .await
            .unwrap();
        assert_eq!(file.current_version, 0);
        assert!(exported.starts_with(b"%PDF"));
        assert_eq!(pdf::page_count(&exported).unwrap(), 2);

        let (_, original) = docs.download(id, VersionRef::Latest).await.unwrap();
        assert_ne!(original, exported);
        assert_eq!(docs.list_versions(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flatten_commits_and_keeps_layers() {
        let ctx = TestContext::new().await;
        let docs = &ctx.state.documents;
        let id = ctx.upload_pdf(&[200]).await;

        ctx.state
            .annotations
            .add_text_overlay(id, "ann", text(0, "Signed"))
            .await
            .unwrap();

        let version = docs
            .flatten_annotations(id, &["ann".to_string()], &[], "ann")
            .await
            .unwrap();
        assert_eq!(version, 1);

        let history = docs.list_versions(id).await.unwrap();
        assert_eq!(history[1].action, "annotations_flatten");
        assert_eq!(history[1].details["text_overlays"], 1);
        assert_eq!(
            ctx.state.annotations.list_layers(id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_font_fails_without_commit() {
        let ctx = TestContext::new().await;
        let docs = &ctx.state.documents;
        let id = ctx.upload_pdf(&[200]).await;

        let mut overlay = text(0, "x");
        overlay.font_name = "Comic Sans".to_string();
        ctx.state
            .annotations
            .add_text_overlay(id, "ann", overlay)
            .await
            .unwrap();

        let err = docs
            .flatten_annotations(id, &["ann".to_string()], &[], "ann")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOperation);
        assert_eq!(docs.list_versions(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_to_original() {
        let ctx = TestContext::new().await;
        let docs = &ctx.state.documents;
        let id = ctx.upload_pdf(&[10, 20, 30]).await;

        docs.mutate(id, EditOperation::PdfDeletePage { page: 0 }, "ann")
            .await
            .unwrap();
        ctx.state
            .annotations
            .set_fabric_page(id, "ann", 0, serde_json::json!({"objects": []}))
            .await
            .unwrap();

        let version = docs.reset_to_original(id, "ann").await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(docs.page_count(id).await.unwrap(), 3);

        let (_, latest) = docs.download(id, VersionRef::Latest).await.unwrap();
        let (_, original) = docs.download(id, VersionRef::Number(0)).await.unwrap();
        assert_eq!(latest, original);
        assert!(ctx.state.annotations.list_layers(id).await.unwrap().is_empty());

        let history = docs.list_versions(id).await.unwrap();
        assert_eq!(history[2].action, "reset_to_original");
        assert_eq!(history[2].details, serde_json::json!({"reverted_to": 0}));
    }

    #[tokio::test]
    async fn test_page_count_rejects_images() {
        let ctx = TestContext::new().await;
        let docs = &ctx.state.documents;
        let id = docs
            .upload("a.png", Bytes::from(png_bytes(4, 4)), "ann")
            .await
            .unwrap()
            .file
            .file_id;
        let err = docs.page_count(id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOperation);
    }
}
