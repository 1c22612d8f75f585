//! Operations that build a new document out of several existing ones.

use bytes::Bytes;
use image::DynamicImage;
use tracing::info;

use doceditor_core::error::AppError;
use doceditor_core::result::AppResult;
use doceditor_core::types::{FileId, VersionRef};
use doceditor_entity::file::{FileRecord, FileType};
use doceditor_transform::{EnhanceOptions, enhance, pdf, raster};

use super::service::{DocumentService, run_blocking};

const MERGED_NAME: &str = "merged.pdf";
const PHOTO_PDF_NAME: &str = "photo-to-pdf.pdf";

impl DocumentService {
    /// Concatenate the latest versions of several PDFs into a new file.
    pub async fn merge_pdfs(&self, file_ids: &[FileId], user: &str) -> AppResult<FileRecord> {
        let sources = self.latest_of(file_ids, FileType::Pdf).await?;

        let merged = run_blocking(move || pdf::merge(&sources)).await?;
        let record = self
            .versions
            .import(MERGED_NAME, FileType::Pdf, "pdf", Bytes::from(merged))
            .await?;

        info!(
            file_id = %record.file.file_id,
            sources = file_ids.len(),
            "PDFs merged"
        );
        self.audit
            .log(
                user,
                "pdf_merge",
                Some(record.file.file_id),
                serde_json::json!({ "source_files": source_list(file_ids) }),
            )
            .await;

        Ok(record)
    }

    /// Clean up each image as a scan and lay them out one per A4 page in a
    /// new PDF.
    pub async fn images_to_pdf(
        &self,
        file_ids: &[FileId],
        options: EnhanceOptions,
        user: &str,
    ) -> AppResult<FileRecord> {
        let sources = self.latest_of(file_ids, FileType::Image).await?;

        let document = run_blocking(move || {
            let pages = sources
                .iter()
                .map(|data| {
                    let img = raster::decode(data)?;
                    Ok(DynamicImage::ImageLuma8(enhance::enhance(&img, &options)))
                })
                .collect::<AppResult<Vec<_>>>()?;
            pdf::images_to_pdf(&pages)
        })
        .await?;

        let record = self
            .versions
            .import(PHOTO_PDF_NAME, FileType::Pdf, "pdf", Bytes::from(document))
            .await?;

        info!(
            file_id = %record.file.file_id,
            pages = file_ids.len(),
            "Images converted to PDF"
        );
        self.audit
            .log(
                user,
                "images_to_pdf",
                Some(record.file.file_id),
                serde_json::json!({ "source_files": source_list(file_ids) }),
            )
            .await;

        Ok(record)
    }

    /// Latest bytes of every file, in order, all of the expected type.
    async fn latest_of(&self, file_ids: &[FileId], expected: FileType) -> AppResult<Vec<Vec<u8>>> {
        if file_ids.is_empty() {
            return Err(AppError::invalid_operation("At least one file is required"));
        }

        let mut sources = Vec::with_capacity(file_ids.len());
        for &file_id in file_ids {
            let (file, data) = self.versions.read(file_id, VersionRef::Latest).await?;
            if file.file_type != expected {
                return Err(AppError::invalid_operation(format!(
                    "File {file_id} is not a {expected} file"
                )));
            }
            sources.push(data.to_vec());
        }
        Ok(sources)
    }
}

fn source_list(file_ids: &[FileId]) -> Vec<String> {
    file_ids.iter().map(ToString::to_string).collect()
}
