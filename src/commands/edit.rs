//! Edit CLI commands: structural edits, history, revert and reset.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use doceditor_core::error::AppError;
use doceditor_entity::file::FileVersion;
use doceditor_service::AppState;
use doceditor_transform::EditOperation;

use super::file::FileArgs;
use crate::output::{self, OutputFormat};

/// Arguments for the edit command
#[derive(Debug, Args)]
pub struct EditArgs {
    /// Document ID
    pub file_id: String,
    /// Operation as JSON, e.g. '{"op":"pdf_rotate_page","page":0,"angle":90}'.
    /// PDF ops: pdf_rotate_page, pdf_delete_page, pdf_reorder_pages. Image
    /// ops: image_crop, image_resize, image_rotate, image_adjust,
    /// image_annotate, image_enhance (images only; PDFs are not enhanced)
    pub operation: String,
}

/// Arguments for the revert command
#[derive(Debug, Args)]
pub struct RevertArgs {
    /// Document ID
    pub file_id: String,
    /// Version to copy forward
    pub version: u32,
}

/// Version display row
#[derive(Debug, Serialize, Tabled)]
pub(crate) struct VersionRow {
    /// Version number
    version: u32,
    /// Action
    action: String,
    /// Created at
    created_at: String,
    /// Details
    details: String,
}

impl From<&FileVersion> for VersionRow {
    fn from(v: &FileVersion) -> Self {
        Self {
            version: v.version,
            action: v.action.clone(),
            created_at: v.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            details: v.details.to_string(),
        }
    }
}

/// Apply one edit operation
pub async fn edit(state: &AppState, args: &EditArgs, user: &str) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let op: EditOperation = serde_json::from_str(&args.operation).map_err(|e| {
        AppError::invalid_operation(format!("Invalid operation '{}': {e}", args.operation))
    })?;
    let action = op.action();

    let version = state.documents.mutate(file_id, op, user).await?;
    output::print_success(&format!("{action} committed as version {version}"));
    Ok(())
}

/// List the versions of a document
pub async fn versions(
    state: &AppState,
    args: &FileArgs,
    format: OutputFormat,
) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let versions = state.documents.list_versions(file_id).await?;
    match format {
        OutputFormat::Table => {
            let rows: Vec<VersionRow> = versions.iter().map(VersionRow::from).collect();
            output::print_list(&rows, format);
        }
        OutputFormat::Json => output::print_item(&versions, format),
    }
    Ok(())
}

/// Copy an earlier version forward
pub async fn revert(state: &AppState, args: &RevertArgs, user: &str) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let version = state.documents.revert(file_id, args.version, user).await?;
    output::print_success(&format!(
        "Reverted to version {} as version {version}",
        args.version
    ));
    Ok(())
}

/// Restore the original upload
pub async fn reset(state: &AppState, args: &FileArgs, user: &str) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let version = state.documents.reset_to_original(file_id, user).await?;
    output::print_success(&format!("Original restored as version {version}"));
    Ok(())
}
