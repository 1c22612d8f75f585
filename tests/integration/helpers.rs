//! Shared test helpers for integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use tempfile::TempDir;

use doceditor_core::config::AppConfig;
use doceditor_core::types::FileId;
use doceditor_service::AppState;
use doceditor_transform::pdf;

/// Test application context
pub struct TestApp {
    /// Wired services
    pub state: AppState,
    /// Keeps the database file and storage root alive
    pub dir: TempDir,
}

impl TestApp {
    /// Create a new test application over a fresh database and storage root
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", dir.path().join("doceditor.db").display());
        config.storage.root_path = dir.path().join("storage").display().to_string();
        config.database.auto_migrate = true;

        let state = AppState::build(config)
            .await
            .expect("Failed to build application state");

        Self { state, dir }
    }

    /// Services built over the same database and storage root, as a second
    /// process would build them
    pub async fn second_process(&self) -> AppState {
        AppState::build((*self.state.config).clone())
            .await
            .expect("Failed to build second application state")
    }

    /// Upload a PDF with one 4x4 gray page per shade
    pub async fn upload_pdf(&self, name: &str, shades: &[u8]) -> FileId {
        let data = pdf_bytes(shades);
        self.state
            .documents
            .upload(name, Bytes::from(data), "alice")
            .await
            .expect("Failed to upload PDF")
            .file
            .file_id
    }

    /// Upload a solid-colour PNG
    pub async fn upload_png(&self, name: &str, width: u32, height: u32) -> FileId {
        self.state
            .documents
            .upload(name, Bytes::from(png_bytes(width, height)), "alice")
            .await
            .expect("Failed to upload image")
            .file
            .file_id
    }

    /// Version numbers of a file in order
    pub async fn version_numbers(&self, file_id: FileId) -> Vec<u32> {
        self.state
            .documents
            .list_versions(file_id)
            .await
            .expect("Failed to list versions")
            .iter()
            .map(|v| v.version)
            .collect()
    }
}

/// A PDF with one 4x4 gray page per shade
pub fn pdf_bytes(shades: &[u8]) -> Vec<u8> {
    let pages: Vec<DynamicImage> = shades
        .iter()
        .map(|&s| DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([s]))))
        .collect();
    pdf::images_to_pdf(&pages).expect("Failed to build PDF")
}

/// A solid-colour PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([120, 160, 200]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode PNG");
    buf
}
