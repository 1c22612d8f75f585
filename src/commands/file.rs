//! Document CLI commands: upload, listing, download and deletion.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use doceditor_core::error::{AppError, ErrorKind};
use doceditor_core::types::VersionRef;
use doceditor_entity::file::FileRecord;
use doceditor_service::AppState;

use crate::output::{self, OutputFormat};

/// Arguments naming one document
#[derive(Debug, Args)]
pub struct FileArgs {
    /// Document ID
    pub file_id: String,
}

/// Arguments for the upload command
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Local file to upload
    pub path: PathBuf,
    /// Name to store instead of the local file name
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Arguments for the download command
#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Document ID
    pub file_id: String,
    /// Version number or "latest"
    #[arg(short, long, default_value = "latest")]
    pub version: VersionRef,
    /// Output path (defaults to the download name in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Document display row
#[derive(Debug, Serialize, Tabled)]
pub(crate) struct FileRow {
    /// Document ID
    id: String,
    /// Original name
    name: String,
    /// Type
    #[tabled(rename = "type")]
    file_type: String,
    /// Current version
    version: u32,
    /// Created at
    created_at: String,
}

impl From<&FileRecord> for FileRow {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.file.file_id.to_string(),
            name: record.file.original_name.clone(),
            file_type: record.file.file_type.to_string(),
            version: record.file.current_version,
            created_at: record.file.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Upload a local file
pub async fn upload(
    state: &AppState,
    args: &UploadArgs,
    user: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let data = tokio::fs::read(&args.path).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::StorageFailure,
            format!("Failed to read {}", args.path.display()),
            e,
        )
    })?;

    let record = state.documents.upload(&name, Bytes::from(data), user).await?;
    print_record(&record, format);
    Ok(())
}

/// List all documents
pub async fn list(state: &AppState, format: OutputFormat) -> Result<(), AppError> {
    let records = state.documents.list_files().await?;
    match format {
        OutputFormat::Table => {
            let rows: Vec<FileRow> = records.iter().map(FileRow::from).collect();
            output::print_list(&rows, format);
        }
        OutputFormat::Json => output::print_item(&records, format),
    }
    Ok(())
}

/// Show one document
pub async fn info(state: &AppState, args: &FileArgs, format: OutputFormat) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let record = state.documents.get_file(file_id).await?;
    print_record(&record, format);
    Ok(())
}

/// Write one version to disk
pub async fn download(state: &AppState, args: &DownloadArgs) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let (file, data) = state.documents.download(file_id, args.version).await?;

    let version = match args.version {
        VersionRef::Latest => file.current_version,
        VersionRef::Number(n) => n,
    };
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(file.download_name(version)));

    write_output(&path, &data).await?;
    output::print_success(&format!(
        "Wrote version {version} ({} bytes) to {}",
        data.len(),
        path.display()
    ));
    Ok(())
}

/// Delete a document
pub async fn delete(state: &AppState, args: &FileArgs, user: &str) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    if state.documents.delete_file(file_id, user).await? {
        output::print_success(&format!("Deleted {file_id}"));
    } else {
        output::print_warning(&format!("No document {file_id}; nothing deleted"));
    }
    Ok(())
}

/// Print the page count of a PDF
pub async fn pages(state: &AppState, args: &FileArgs, format: OutputFormat) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let count = state.documents.page_count(file_id).await?;
    match format {
        OutputFormat::Table => output::print_kv("Pages", &count.to_string()),
        OutputFormat::Json => output::print_item(&serde_json::json!({ "pages": count }), format),
    }
    Ok(())
}

pub(crate) fn print_record(record: &FileRecord, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let file = &record.file;
            output::print_kv("ID", &file.file_id.to_string());
            output::print_kv("Name", &file.original_name);
            output::print_kv("Type", file.file_type.as_str());
            output::print_kv("Extension", &file.ext);
            output::print_kv("Created", &file.created_at.to_rfc3339());
            output::print_kv("Current version", &file.current_version.to_string());
            println!();
            let rows: Vec<super::edit::VersionRow> =
                record.versions.iter().map(super::edit::VersionRow::from).collect();
            output::print_list(&rows, format);
        }
        OutputFormat::Json => output::print_item(record, format),
    }
}

pub(crate) async fn write_output(path: &Path, data: &[u8]) -> Result<(), AppError> {
    tokio::fs::write(path, data).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::StorageFailure,
            format!("Failed to write {}", path.display()),
            e,
        )
    })
}
