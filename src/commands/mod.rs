//! CLI command definitions and dispatch.

pub mod annotations;
pub mod audit;
pub mod compose;
pub mod edit;
pub mod file;
pub mod maintenance;

use clap::{Parser, Subcommand};

use doceditor_core::config::AppConfig;
use doceditor_core::error::AppError;
use doceditor_core::types::FileId;
use doceditor_service::AppState;

use crate::output::OutputFormat;

/// DocEditor: versioned PDF and image editing
#[derive(Debug, Parser)]
#[command(name = "doceditor", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// User label recorded in the audit log (defaults to editor.default_user)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a PDF or image as a new document
    Upload(file::UploadArgs),
    /// List documents, newest first
    List,
    /// Show one document and its versions
    Info(file::FileArgs),
    /// Write one version of a document to disk
    Download(file::DownloadArgs),
    /// Delete a document with all its versions
    Delete(file::FileArgs),
    /// Count the pages of a PDF
    Pages(file::FileArgs),
    /// Apply an edit operation given as JSON
    Edit(edit::EditArgs),
    /// List the versions of a document
    Versions(file::FileArgs),
    /// Commit an earlier version as the newest one
    Revert(edit::RevertArgs),
    /// Restore the original upload and drop all annotation layers
    Reset(file::FileArgs),
    /// Show recent audit entries
    Audit(audit::AuditArgs),
    /// Merge PDFs into a new document
    Merge(compose::MergeArgs),
    /// Convert images into a cleaned-up PDF
    PhotoToPdf(compose::PhotoToPdfArgs),
    /// Per-user annotation layers
    Annotations(annotations::AnnotationArgs),
    /// Render annotations onto the latest PDF version and save the result
    Export(annotations::ExportArgs),
    /// Render annotations and commit them as a new version
    Flatten(annotations::FlattenArgs),
    /// Remove blobs left behind by interrupted commits
    Sweep,
    /// Create or upgrade the database schema (run once before first use
    /// unless database.auto_migrate is set)
    Migrate,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        let user = self
            .user
            .clone()
            .unwrap_or_else(|| config.editor.default_user.clone());
        let state = AppState::build(config).await?;
        let format = self.format;

        let result = match &self.command {
            Commands::Upload(args) => file::upload(&state, args, &user, format).await,
            Commands::List => file::list(&state, format).await,
            Commands::Info(args) => file::info(&state, args, format).await,
            Commands::Download(args) => file::download(&state, args).await,
            Commands::Delete(args) => file::delete(&state, args, &user).await,
            Commands::Pages(args) => file::pages(&state, args, format).await,
            Commands::Edit(args) => edit::edit(&state, args, &user).await,
            Commands::Versions(args) => edit::versions(&state, args, format).await,
            Commands::Revert(args) => edit::revert(&state, args, &user).await,
            Commands::Reset(args) => edit::reset(&state, args, &user).await,
            Commands::Audit(args) => audit::execute(&state, args, format).await,
            Commands::Merge(args) => compose::merge(&state, args, &user, format).await,
            Commands::PhotoToPdf(args) => compose::photo_to_pdf(&state, args, &user, format).await,
            Commands::Annotations(args) => annotations::execute(&state, args, &user, format).await,
            Commands::Export(args) => annotations::export(&state, args).await,
            Commands::Flatten(args) => annotations::flatten(&state, args, &user).await,
            Commands::Sweep => maintenance::sweep(&state, format).await,
            Commands::Migrate => maintenance::migrate(&state).await,
        };

        state.db.close().await;
        result
    }
}

/// Helper: parse a file id argument
pub fn parse_file_id(raw: &str) -> Result<FileId, AppError> {
    raw.parse::<FileId>()
        .map_err(|e| AppError::invalid_operation(format!("Invalid file id '{raw}': {e}")))
}

/// Helper: parse a list of file id arguments
pub fn parse_file_ids(raw: &[String]) -> Result<Vec<FileId>, AppError> {
    raw.iter().map(|id| parse_file_id(id)).collect()
}
