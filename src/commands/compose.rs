//! CLI commands that build a new document from several others.

use clap::Args;

use doceditor_core::error::AppError;
use doceditor_service::AppState;
use doceditor_transform::EnhanceOptions;

use crate::output::OutputFormat;

/// Arguments for the merge command
#[derive(Debug, Args)]
pub struct MergeArgs {
    /// PDF document IDs in page order
    #[arg(required = true)]
    pub file_ids: Vec<String>,
}

/// Arguments for the photo-to-pdf command
#[derive(Debug, Args)]
pub struct PhotoToPdfArgs {
    /// Image document IDs, one page each
    #[arg(required = true)]
    pub file_ids: Vec<String>,
    /// Skip straightening
    #[arg(long)]
    pub no_deskew: bool,
    /// Skip sharpening
    #[arg(long)]
    pub no_sharpen: bool,
    /// Skip contrast equalisation
    #[arg(long)]
    pub no_contrast: bool,
    /// Skip black-and-white thresholding
    #[arg(long)]
    pub no_threshold: bool,
}

/// Merge PDFs
pub async fn merge(
    state: &AppState,
    args: &MergeArgs,
    user: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let file_ids = super::parse_file_ids(&args.file_ids)?;
    let record = state.documents.merge_pdfs(&file_ids, user).await?;
    super::file::print_record(&record, format);
    Ok(())
}

/// Convert images to a PDF
pub async fn photo_to_pdf(
    state: &AppState,
    args: &PhotoToPdfArgs,
    user: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let file_ids = super::parse_file_ids(&args.file_ids)?;
    let options = EnhanceOptions {
        deskew: !args.no_deskew,
        sharpen: !args.no_sharpen,
        contrast: !args.no_contrast,
        threshold: !args.no_threshold,
    };
    let record = state
        .documents
        .images_to_pdf(&file_ids, options, user)
        .await?;
    super::file::print_record(&record, format);
    Ok(())
}
