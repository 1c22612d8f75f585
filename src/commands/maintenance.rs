//! Storage and database maintenance commands.

use doceditor_core::error::AppError;
use doceditor_database::migration::run_migrations;
use doceditor_service::AppState;

use crate::output::{self, OutputFormat};

/// Remove orphaned blobs and report missing ones
pub async fn sweep(state: &AppState, format: OutputFormat) -> Result<(), AppError> {
    let report = state.versions.sweep_orphans().await?;
    match format {
        OutputFormat::Table => {
            for path in &report.removed {
                output::print_kv("Removed", path);
            }
            for missing in &report.missing {
                output::print_warning(&format!(
                    "Version {} of {} has no blob",
                    missing.version, missing.file_id
                ));
            }
            output::print_success(&format!(
                "Sweep finished: {} removed, {} missing",
                report.removed.len(),
                report.missing.len()
            ));
        }
        OutputFormat::Json => output::print_item(&report, format),
    }
    Ok(())
}

/// Apply pending migrations
pub async fn migrate(state: &AppState) -> Result<(), AppError> {
    run_migrations(state.db.pool()).await?;
    output::print_success("All migrations applied successfully.");
    Ok(())
}
