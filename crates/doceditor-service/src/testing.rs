//! Shared fixtures for unit tests.

use bytes::Bytes;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use tempfile::TempDir;

use doceditor_core::config::AppConfig;
use doceditor_core::types::FileId;
use doceditor_transform::pdf;

use crate::state::AppState;

/// Services over a throwaway database and storage root.
pub(crate) struct TestContext {
    pub state: AppState,
    _dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::build(AppConfig::default()).await
    }

    pub async fn with_upload_limit(limit: u64) -> Self {
        let mut config = AppConfig::default();
        config.storage.max_upload_size_bytes = limit;
        Self::build(config).await
    }

    async fn build(mut config: AppConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        config.database.url = format!("sqlite://{}", dir.path().join("test.db").display());
        config.storage.root_path = dir.path().join("storage").display().to_string();
        config.database.auto_migrate = true;
        let state = AppState::build(config).await.unwrap();
        Self { state, _dir: dir }
    }

    /// A second, independently built set of services over the same
    /// database file and storage root, as another process would have.
    pub async fn second_process(&self) -> AppState {
        AppState::build((*self.state.config).clone()).await.unwrap()
    }

    /// Upload a PDF with one solid gray page per shade.
    pub async fn upload_pdf(&self, shades: &[u8]) -> FileId {
        let pages: Vec<DynamicImage> = shades
            .iter()
            .map(|&s| DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([s]))))
            .collect();
        let data = pdf::images_to_pdf(&pages).unwrap();
        self.state
            .documents
            .upload("doc.pdf", Bytes::from(data), "ann")
            .await
            .unwrap()
            .file
            .file_id
    }
}

/// A solid-colour PNG.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([180, 90, 30]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}
