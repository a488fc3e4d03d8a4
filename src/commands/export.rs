// ABOUTME: Export command writing the SQLite source to CSV data files and schema.json
// ABOUTME: Runs the blocking SQLite work off the async runtime

use crate::migration::{self, ExportSummary};
use anyhow::{Context, Result};
use std::path::Path;

/// Export the source database into `export_dir`
///
/// Exports `tables`, or every user table when the list is empty. Tables that
/// cannot be read are skipped with a warning; the command only fails when
/// the source itself is missing or unreadable.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use sqlite_postgres_migrator::commands::export;
/// # use std::path::Path;
/// # async fn example() -> Result<()> {
/// let summary = export(Path::new("shop.db"), Path::new("export"), &[]).await?;
/// assert!(summary.skipped.is_empty());
/// # Ok(())
/// # }
/// ```
pub async fn export(source_path: &Path, export_dir: &Path, tables: &[String]) -> Result<ExportSummary> {
    tracing::info!("Starting export of {}...", source_path.display());

    let source = source_path.to_path_buf();
    let dir = export_dir.to_path_buf();
    let requested = tables.to_vec();
    let summary = tokio::task::spawn_blocking(move || {
        migration::export_database(&source, &dir, &requested)
    })
    .await
    .context("Export task panicked")??;

    tracing::info!("");
    tracing::info!("========================================");
    tracing::info!("Export Summary");
    tracing::info!("========================================");
    tracing::info!("Exported tables: {}", summary.manifest.tables.len());
    tracing::info!("Skipped tables: {}", summary.skipped.len());
    tracing::info!("Manifest: {}", summary.manifest_path.display());
    tracing::info!("========================================");

    for skipped in &summary.skipped {
        tracing::warn!("  ⚠ {} was not exported: {}", skipped.table, skipped.reason);
    }

    Ok(summary)
}
