//! Integration tests for the version chain.

mod helpers;

use std::sync::Arc;

use doceditor_core::error::ErrorKind;
use doceditor_core::types::{FileId, VersionRef};
use doceditor_transform::{EditOperation, pdf};

#[tokio::test]
async fn test_pdf_edit_and_revert_scenario() {
    let app = helpers::TestApp::new().await;
    let docs = &app.state.documents;
    let id = app.upload_pdf("report.pdf", &[10, 20, 30]).await;
    let (_, original) = docs.download(id, VersionRef::Number(0)).await.unwrap();

    let v1 = docs
        .mutate(id, EditOperation::PdfRotatePage { page: 0, angle: 90 }, "alice")
        .await
        .unwrap();
    assert_eq!(v1, 1);

    let v2 = docs
        .mutate(id, EditOperation::PdfDeletePage { page: 2 }, "alice")
        .await
        .unwrap();
    assert_eq!(v2, 2);
    assert_eq!(docs.page_count(id).await.unwrap(), 2);

    let v3 = docs.revert(id, 0, "alice").await.unwrap();
    assert_eq!(v3, 3);

    assert_eq!(app.version_numbers(id).await, vec![0, 1, 2, 3]);

    let (_, latest) = docs.download(id, VersionRef::Latest).await.unwrap();
    assert_eq!(latest, original);
    let (_, still_original) = docs.download(id, VersionRef::Number(0)).await.unwrap();
    assert_eq!(still_original, original);

    let (_, rotated) = docs.download(id, VersionRef::Number(1)).await.unwrap();
    assert_eq!(pdf::page_count(&rotated).unwrap(), 3);

    let history = docs.list_versions(id).await.unwrap();
    let actions: Vec<&str> = history.iter().map(|v| v.action.as_str()).collect();
    assert_eq!(
        actions,
        vec!["upload", "pdf_rotate_page", "pdf_delete_page", "revert"]
    );
    assert_eq!(history[1].details, serde_json::json!({"page": 0, "angle": 90}));
    assert_eq!(history[3].details, serde_json::json!({"reverted_to": 0}));
}

#[tokio::test]
async fn test_deleting_only_page_fails() {
    let app = helpers::TestApp::new().await;
    let docs = &app.state.documents;
    let id = app.upload_pdf("single.pdf", &[50]).await;

    let err = docs
        .mutate(id, EditOperation::PdfDeletePage { page: 0 }, "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidOperation);

    assert_eq!(app.state.versions.current_version(id).await.unwrap(), 0);
    assert_eq!(app.version_numbers(id).await, vec![0]);
    assert_eq!(app.state.versions.blobs().scan().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_edits_apply_in_turn() {
    let app = helpers::TestApp::new().await;
    let id = app.upload_png("photo.png", 40, 20).await;
    let docs = Arc::clone(&app.state.documents);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let docs = Arc::clone(&docs);
        tasks.push(tokio::spawn(async move {
            docs.mutate(id, EditOperation::ImageRotate { angle: 90.0 }, "alice")
                .await
        }));
    }

    let mut versions = Vec::new();
    for task in tasks {
        versions.push(task.await.unwrap().unwrap());
    }
    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2, 3, 4]);
    assert_eq!(app.version_numbers(id).await, vec![0, 1, 2, 3, 4]);

    // Four quarter turns, each applied to the previous result.
    let (_, latest) = docs.download(id, VersionRef::Latest).await.unwrap();
    let img = image::load_from_memory(&latest).unwrap();
    assert_eq!((img.width(), img.height()), (40, 20));
    let (_, third) = docs.download(id, VersionRef::Number(3)).await.unwrap();
    let img = image::load_from_memory(&third).unwrap();
    assert_eq!((img.width(), img.height()), (20, 40));
}

#[tokio::test]
async fn test_edits_from_two_processes_stay_readable() {
    let app = helpers::TestApp::new().await;
    let other = app.second_process().await;
    let id = app.upload_png("photo.png", 30, 10).await;

    for _ in 0..5 {
        let (a, b) = tokio::join!(
            app.state.documents.mutate(
                id,
                EditOperation::ImageRotate { angle: 90.0 },
                "alice"
            ),
            other.documents.mutate(
                id,
                EditOperation::ImageAdjust {
                    brightness: 1.1,
                    contrast: 1.0,
                    saturation: 1.0,
                },
                "bob"
            ),
        );
        assert_ne!(a.unwrap(), b.unwrap());
    }

    assert_eq!(app.version_numbers(id).await, (0..=10).collect::<Vec<u32>>());
    for version in 0..=10 {
        let (_, data) = other
            .documents
            .download(id, VersionRef::Number(version))
            .await
            .unwrap();
        assert!(image::load_from_memory(&data).is_ok());
    }
}

#[tokio::test]
async fn test_delete_then_resolve() {
    let app = helpers::TestApp::new().await;
    let docs = &app.state.documents;
    let id = app.upload_png("photo.png", 8, 8).await;
    docs.mutate(
        id,
        EditOperation::ImageResize {
            width: 4,
            height: 4,
        },
        "alice",
    )
    .await
    .unwrap();

    assert!(docs.delete_file(id, "alice").await.unwrap());

    let err = app
        .state
        .versions
        .resolve(id, VersionRef::Latest)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    let err = docs.download(id, VersionRef::Number(0)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    assert!(!docs.delete_file(id, "alice").await.unwrap());
    assert!(app.state.versions.blobs().scan().await.unwrap().is_empty());

    // Audit entries outlive the file.
    let audit = docs.get_audit_log(None, Some(id)).await.unwrap();
    let actions: Vec<&str> = audit.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["upload", "image_resize", "delete", "delete"]);
}

#[tokio::test]
async fn test_unknown_file_and_version() {
    let app = helpers::TestApp::new().await;
    let docs = &app.state.documents;

    let err = docs
        .mutate(FileId::new(), EditOperation::ImageRotate { angle: 90.0 }, "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let id = app.upload_png("a.png", 2, 2).await;
    let err = docs.revert(id, 5, "alice").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(app.version_numbers(id).await, vec![0]);
}
