//! Integration tests for composing, annotating and maintaining documents.

mod helpers;

use bytes::Bytes;

use doceditor_core::error::ErrorKind;
use doceditor_core::types::VersionRef;
use doceditor_entity::annotation::TextOverlay;
use doceditor_entity::file::FileType;
use doceditor_transform::enhance::EnhanceOptions;
use doceditor_transform::{EditOperation, pdf};

#[tokio::test]
async fn test_merge_creates_independent_file() {
    let app = helpers::TestApp::new().await;
    let docs = &app.state.documents;
    let first = app.upload_pdf("a.pdf", &[10, 20]).await;
    let second = app.upload_pdf("b.pdf", &[30]).await;

    let merged = docs.merge_pdfs(&[first, second], "bob").await.unwrap();
    let merged_id = merged.file.file_id;
    assert_eq!(merged.file.original_name, "merged.pdf");
    assert_eq!(merged.file.current_version, 0);
    assert_eq!(docs.page_count(merged_id).await.unwrap(), 3);

    // Sources are untouched, and later edits to them do not leak.
    assert_eq!(app.version_numbers(first).await, vec![0]);
    docs.mutate(first, EditOperation::PdfDeletePage { page: 0 }, "bob")
        .await
        .unwrap();
    assert_eq!(docs.page_count(merged_id).await.unwrap(), 3);

    let audit = docs.get_audit_log(None, Some(merged_id)).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "pdf_merge");
    assert_eq!(audit[0].user, "bob");
}

#[tokio::test]
async fn test_merge_rejects_images() {
    let app = helpers::TestApp::new().await;
    let pdf_id = app.upload_pdf("a.pdf", &[10]).await;
    let png_id = app.upload_png("b.png", 4, 4).await;

    let err = app
        .state
        .documents
        .merge_pdfs(&[pdf_id, png_id], "bob")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);
    assert_eq!(app.state.documents.list_files().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_images_to_pdf() {
    let app = helpers::TestApp::new().await;
    let docs = &app.state.documents;
    let a = app.upload_png("scan-1.png", 30, 40).await;
    let b = app.upload_png("scan-2.png", 50, 20).await;

    let record = docs
        .images_to_pdf(&[a, b], EnhanceOptions::default(), "bob")
        .await
        .unwrap();
    assert_eq!(record.file.file_type, FileType::Pdf);
    assert_eq!(record.file.ext, "pdf");

    let (_, data) = docs
        .download(record.file.file_id, VersionRef::Latest)
        .await
        .unwrap();
    assert!(data.starts_with(b"%PDF"));
    assert_eq!(pdf::page_count(&data).unwrap(), 2);

    let err = docs
        .images_to_pdf(&[], EnhanceOptions::default(), "bob")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);
}

#[tokio::test]
async fn test_layers_are_per_user() {
    let app = helpers::TestApp::new().await;
    let annotations = &app.state.annotations;
    let id = app.upload_pdf("contract.pdf", &[255, 255]).await;

    let overlay = TextOverlay {
        page: 1,
        text: "Approved".to_string(),
        x: 72.0,
        y: 72.0,
        font_size: 18.0,
        font_name: "Helvetica-Bold".to_string(),
        color: [1.0, 0.0, 0.0],
    };
    annotations
        .add_text_overlay(id, "alice", overlay.clone())
        .await
        .unwrap();
    annotations
        .set_fabric_page(id, "bob", 0, serde_json::json!({"objects": [{"type": "rect"}]}))
        .await
        .unwrap();

    let alice = annotations.get_layer(id, "alice").await.unwrap();
    assert_eq!(alice.text_overlays, vec![overlay]);
    assert!(alice.fabric_pages.is_empty());

    let carol = annotations.get_layer(id, "carol").await.unwrap();
    assert!(carol.is_empty());
    assert_eq!(annotations.list_layers(id).await.unwrap().len(), 2);

    // Layers never touch the version chain until flattened.
    assert_eq!(app.version_numbers(id).await, vec![0]);
    let version = app
        .state
        .documents
        .flatten_annotations(id, &["alice".to_string()], &[], "alice")
        .await
        .unwrap();
    assert_eq!(version, 1);
    assert_eq!(app.state.documents.page_count(id).await.unwrap(), 2);

    assert!(annotations.delete_layer(id, "bob").await.unwrap());
    assert!(!annotations.delete_layer(id, "bob").await.unwrap());
}

#[tokio::test]
async fn test_sweep_removes_stray_blobs() {
    let app = helpers::TestApp::new().await;
    let id = app.upload_png("photo.png", 6, 6).await;
    let blobs = app.state.versions.blobs();

    // A blob past the current version, as left by an interrupted commit.
    blobs
        .write(id, "png", 7, Bytes::from(helpers::png_bytes(2, 2)))
        .await
        .unwrap();
    assert_eq!(blobs.scan().await.unwrap().len(), 2);

    let report = app.state.versions.sweep_orphans().await.unwrap();
    assert_eq!(report.removed.len(), 1);
    assert!(report.missing.is_empty());
    assert_eq!(blobs.scan().await.unwrap().len(), 1);

    let (_, data) = app
        .state
        .documents
        .download(id, VersionRef::Latest)
        .await
        .unwrap();
    assert_eq!(&data[..], &helpers::png_bytes(6, 6)[..]);
}
