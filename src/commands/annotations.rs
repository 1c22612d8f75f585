//! Annotation layer CLI commands and annotated export.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use doceditor_core::error::{AppError, ErrorKind};
use doceditor_core::types::FileId;
use doceditor_entity::annotation::{AnnotationLayer, FabricOverlay, TextOverlay};
use doceditor_service::AppState;

use crate::output::{self, OutputFormat};

/// Arguments for annotation commands
#[derive(Debug, Args)]
pub struct AnnotationArgs {
    /// Annotation subcommand
    #[command(subcommand)]
    pub command: AnnotationCommand,
}

/// Annotation subcommands
#[derive(Debug, Subcommand)]
pub enum AnnotationCommand {
    /// List every saved layer of a document
    List {
        /// Document ID
        file_id: String,
    },
    /// Show the layer of the current user
    Show {
        /// Document ID
        file_id: String,
    },
    /// Delete the layer of the current user
    Delete {
        /// Document ID
        file_id: String,
    },
    /// Add a text overlay to the current user's layer
    Text {
        /// Document ID
        file_id: String,
        /// Zero-based page index
        #[arg(short, long)]
        page: u32,
        /// Horizontal offset in points from the left edge
        #[arg(short)]
        x: f32,
        /// Vertical offset in points from the top edge
        #[arg(short)]
        y: f32,
        /// Font size in points
        #[arg(long, default_value = "12")]
        font_size: f32,
        /// Standard PDF font name
        #[arg(long, default_value = "Helvetica")]
        font: String,
        /// Colour as r,g,b (0-1 or 0-255)
        #[arg(long, value_delimiter = ',', default_value = "0,0,0")]
        color: Vec<f32>,
        /// The text
        text: String,
    },
}

/// Arguments for the export command
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Document ID
    pub file_id: String,
    /// Users whose text overlays are rendered
    #[arg(long = "layer", value_name = "USER")]
    pub layers: Vec<String>,
    /// JSON file with client-rendered page overlays ([{page, user, png}])
    #[arg(long)]
    pub fabric: Option<PathBuf>,
    /// Output path (defaults to {name}_annotated.pdf)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the flatten command
#[derive(Debug, Args)]
pub struct FlattenArgs {
    /// Document ID
    pub file_id: String,
    /// Users whose text overlays are rendered
    #[arg(long = "layer", value_name = "USER")]
    pub layers: Vec<String>,
    /// JSON file with client-rendered page overlays ([{page, user, png}])
    #[arg(long)]
    pub fabric: Option<PathBuf>,
}

/// Layer display row
#[derive(Debug, Serialize, Tabled)]
struct LayerRow {
    /// User
    user: String,
    /// Text overlays
    texts: usize,
    /// Annotated pages
    pages: usize,
    /// Last saved
    updated_at: String,
}

impl From<&AnnotationLayer> for LayerRow {
    fn from(layer: &AnnotationLayer) -> Self {
        Self {
            user: layer.user.clone(),
            texts: layer.text_overlays.len(),
            pages: layer.fabric_pages.len(),
            updated_at: layer
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

/// Execute annotation commands
pub async fn execute(
    state: &AppState,
    args: &AnnotationArgs,
    user: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let annotations = &state.annotations;

    match &args.command {
        AnnotationCommand::List { file_id } => {
            let layers = annotations
                .list_layers(super::parse_file_id(file_id)?)
                .await?;
            match format {
                OutputFormat::Table => {
                    let rows: Vec<LayerRow> = layers.iter().map(LayerRow::from).collect();
                    output::print_list(&rows, format);
                }
                OutputFormat::Json => output::print_item(&layers, format),
            }
        }
        AnnotationCommand::Show { file_id } => {
            let layer = annotations
                .get_layer(super::parse_file_id(file_id)?, user)
                .await?;
            output::print_item(&layer, format);
        }
        AnnotationCommand::Delete { file_id } => {
            let file_id = super::parse_file_id(file_id)?;
            if annotations.delete_layer(file_id, user).await? {
                output::print_success(&format!("Deleted layer of '{user}' on {file_id}"));
            } else {
                output::print_warning(&format!("'{user}' has no layer on {file_id}"));
            }
        }
        AnnotationCommand::Text {
            file_id,
            page,
            x,
            y,
            font_size,
            font,
            color,
            text,
        } => {
            let color: [f32; 3] = color.as_slice().try_into().map_err(|_| {
                AppError::invalid_operation("Colour needs exactly three components")
            })?;
            let overlay = TextOverlay {
                page: *page,
                text: text.clone(),
                x: *x,
                y: *y,
                font_size: *font_size,
                font_name: font.clone(),
                color,
            };
            let layer = annotations
                .add_text_overlay(super::parse_file_id(file_id)?, user, overlay)
                .await?;
            output::print_success(&format!(
                "Layer of '{user}' now has {} text overlays",
                layer.text_overlays.len()
            ));
        }
    }

    Ok(())
}

/// Render annotations to a file without committing
pub async fn export(state: &AppState, args: &ExportArgs) -> Result<(), AppError> {
    let file_id = super::parse_file_id(&args.file_id)?;
    let fabric = read_fabric(args.fabric.as_ref()).await?;

    let (file, data) = state
        .documents
        .export_annotated(file_id, &args.layers, &fabric)
        .await?;

    let path = args.output.clone().unwrap_or_else(|| {
        let stem = file
            .original_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&file.original_name);
        PathBuf::from(format!("{stem}_annotated.pdf"))
    });
    super::file::write_output(&path, &data).await?;
    output::print_success(&format!("Wrote annotated export to {}", path.display()));
    Ok(())
}

/// Render annotations and commit them
pub async fn flatten(state: &AppState, args: &FlattenArgs, user: &str) -> Result<(), AppError> {
    let file_id: FileId = super::parse_file_id(&args.file_id)?;
    let fabric = read_fabric(args.fabric.as_ref()).await?;

    let version = state
        .documents
        .flatten_annotations(file_id, &args.layers, &fabric, user)
        .await?;
    output::print_success(&format!("Annotations flattened into version {version}"));
    Ok(())
}

async fn read_fabric(path: Option<&PathBuf>) -> Result<Vec<FabricOverlay>, AppError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = tokio::fs::read(path).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::StorageFailure,
            format!("Failed to read {}", path.display()),
            e,
        )
    })?;
    serde_json::from_slice(&raw).map_err(|e| {
        AppError::invalid_operation(format!("Invalid overlay file {}: {e}", path.display()))
    })
}
