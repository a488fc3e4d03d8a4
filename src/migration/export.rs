// ABOUTME: Schema exporter writing one CSV data file per table plus schema.json
// ABOUTME: Skips tables that fail introspection without aborting the export

use super::codec::{CellValue, RowWriter};
use super::descriptor::{ManifestEntry, SchemaManifest, TableDescriptor, MANIFEST_FILE};
use super::typemap::postgres_type;
use crate::{sqlite, utils};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A table that could not be exported, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTable {
    pub table: String,
    pub reason: String,
}

/// Outcome of an export run
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub manifest: SchemaManifest,
    pub manifest_path: PathBuf,
    pub skipped: Vec<SkippedTable>,
}

impl ExportSummary {
    pub fn exported_tables(&self) -> Vec<String> {
        self.manifest.table_names()
    }
}

/// Export the source database into `export_dir`
///
/// Exports `tables` when given, otherwise every user table. A missing source
/// file is fatal and is detected before any connection is opened. Tables that
/// fail introspection or reading are logged, recorded in
/// [`ExportSummary::skipped`], and left out of the manifest.
///
/// # Examples
///
/// ```no_run
/// # use sqlite_postgres_migrator::migration::export_database;
/// # use std::path::Path;
/// # fn example() -> anyhow::Result<()> {
/// let summary = export_database(Path::new("shop.db"), Path::new("export"), &[])?;
/// println!("Exported {} tables", summary.exported_tables().len());
/// # Ok(())
/// # }
/// ```
pub fn export_database(
    source_path: &Path,
    export_dir: &Path,
    tables: &[String],
) -> Result<ExportSummary> {
    let conn = sqlite::open_source(source_path)?;

    std::fs::create_dir_all(export_dir).with_context(|| {
        format!(
            "Failed to create export directory {}",
            export_dir.display()
        )
    })?;

    let tables = if tables.is_empty() {
        sqlite::list_tables(&conn)?
    } else {
        tables.to_vec()
    };

    if tables.is_empty() {
        tracing::warn!("⚠ No tables found in {}", source_path.display());
    } else {
        tracing::info!("Exporting {} table(s) to {}", tables.len(), export_dir.display());
    }

    let mut manifest =
        SchemaManifest::new(&source_path.display().to_string(), sqlite::library_version());
    let mut skipped = Vec::new();
    let mut used_names = HashSet::new();

    let progress = ProgressBar::new(tables.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    for table in &tables {
        progress.set_message(format!("Exporting {}", table));

        let data_file = data_file_name(table, &mut used_names);
        match export_table(&conn, table, export_dir, &data_file) {
            Ok(entry) => {
                tracing::info!(
                    "  ✓ {}: {} rows -> {}",
                    entry.table.name,
                    entry.table.row_count,
                    entry.data_file
                );
                manifest.tables.push(entry);
            }
            Err(e) => {
                tracing::warn!(
                    "  ⚠ Skipping {}: {:#}",
                    utils::sanitize_identifier(table),
                    e
                );
                skipped.push(SkippedTable {
                    table: table.clone(),
                    reason: format!("{:#}", e),
                });
            }
        }
        progress.inc(1);
    }

    progress.finish_with_message("Export complete");

    let manifest_path = export_dir.join(MANIFEST_FILE);
    manifest.save(&manifest_path)?;

    tracing::info!(
        "✓ Wrote schema manifest {} ({} table(s), {} skipped)",
        manifest_path.display(),
        manifest.tables.len(),
        skipped.len()
    );

    Ok(ExportSummary {
        manifest,
        manifest_path,
        skipped,
    })
}

/// Export one table: introspect, write its data file, hash it
fn export_table(
    conn: &Connection,
    table: &str,
    export_dir: &Path,
    data_file: &str,
) -> Result<ManifestEntry> {
    let mut descriptor = sqlite::describe_table(conn, table)?;

    // Write to a temp file in the same directory so a failed table never leaves a partial file
    let temp = NamedTempFile::new_in(export_dir)
        .context("Failed to create temporary data file")?;
    let rows = write_rows(conn, &descriptor, temp.as_file())?;

    // The count from introspection and the rows written can differ if the source changed
    if rows as i64 != descriptor.row_count {
        tracing::warn!(
            "  ⚠ {}: counted {} rows but wrote {}",
            descriptor.name,
            descriptor.row_count,
            rows
        );
        descriptor.row_count = rows as i64;
    }

    let path = export_dir.join(data_file);
    temp.persist(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    let sha256 = sha256_file(&path)?;

    Ok(ManifestEntry {
        table: descriptor,
        data_file: data_file.to_string(),
        sha256,
    })
}

fn write_rows(
    conn: &Connection,
    descriptor: &TableDescriptor,
    file: &std::fs::File,
) -> Result<u64> {
    // SQLite keeps non-integral reals in INT columns; BIGINT would reject them at load time
    let integer_columns: Vec<usize> = descriptor
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| postgres_type(&c.declared_type) == "BIGINT")
        .map(|(idx, _)| idx)
        .collect();

    let mut writer = RowWriter::new(BufWriter::new(file), &descriptor.column_names())?;
    let mut row_number = 0u64;
    sqlite::stream_rows(conn, descriptor, |row| {
        row_number += 1;
        for &idx in &integer_columns {
            if let CellValue::Real(value) = row[idx] {
                bail!(
                    "{}.{} in row {} holds {}, which does not fit the BIGINT destination column",
                    descriptor.name,
                    descriptor.columns[idx].name,
                    row_number,
                    value
                );
            }
        }
        writer.write_row(row)
    })?;
    writer.finish()
}

/// Pick a file-system safe, unique data file name for a table
fn data_file_name(table: &str, used: &mut HashSet<String>) -> String {
    let stem: String = table
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() {
        "table".to_string()
    } else {
        stem
    };

    let mut candidate = format!("{}.csv", stem);
    let mut suffix = 2;
    // Case-insensitive so exports stay valid on case-insensitive file systems
    while !used.insert(candidate.to_lowercase()) {
        candidate = format!("{}_{}.csv", stem, suffix);
        suffix += 1;
    }
    candidate
}

/// Lowercase hex sha256 of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
