//! Audit log CLI command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use doceditor_core::error::AppError;
use doceditor_service::AppState;

use crate::output::{self, OutputFormat};

/// Arguments for the audit command
#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Only entries for this document
    #[arg(long)]
    pub file_id: Option<String>,
    /// Number of entries (defaults to editor.audit_default_limit)
    #[arg(short, long)]
    pub limit: Option<u32>,
}

/// Audit display row
#[derive(Debug, Serialize, Tabled)]
struct AuditRow {
    /// Time
    time: String,
    /// User
    user: String,
    /// Action
    action: String,
    /// Document ID
    file_id: String,
    /// Details
    details: String,
}

/// Show recent audit entries, oldest first
pub async fn execute(state: &AppState, args: &AuditArgs, format: OutputFormat) -> Result<(), AppError> {
    let file_id = args
        .file_id
        .as_deref()
        .map(super::parse_file_id)
        .transpose()?;
    let entries = state.documents.get_audit_log(args.limit, file_id).await?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<AuditRow> = entries
                .iter()
                .map(|e| AuditRow {
                    time: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    user: e.user.clone(),
                    action: e.action.clone(),
                    file_id: e.file_id.clone(),
                    details: e.details.to_string(),
                })
                .collect();
            output::print_list(&rows, format);
        }
        OutputFormat::Json => output::print_item(&entries, format),
    }
    Ok(())
}
