// ABOUTME: Post-migration verification of row counts and a sample join
// ABOUTME: Compares the SQLite source against the PostgreSQL destination without modifying either

use super::descriptor::TableDescriptor;
use crate::{postgres, sqlite};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio_postgres::Client;

/// Result of one count query, with failures kept as messages
pub type CountOutcome = std::result::Result<i64, String>;

/// What verification found for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Compared { source: i64, destination: i64 },
    /// Either side could not be counted
    Unverified { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub table: String,
    pub outcome: Outcome,
}

impl VerificationResult {
    /// Combine the two counts for a table; any failure makes it unverified
    pub fn new(table: &str, source: CountOutcome, destination: CountOutcome) -> Self {
        let outcome = match (source, destination) {
            (Ok(source), Ok(destination)) => Outcome::Compared {
                source,
                destination,
            },
            (Err(e), _) => Outcome::Unverified {
                reason: format!("source: {}", e),
            },
            (_, Err(e)) => Outcome::Unverified {
                reason: format!("destination: {}", e),
            },
        };
        Self {
            table: table.to_string(),
            outcome,
        }
    }

    /// `Some(true)` when counts match, `None` when the table could not be verified
    pub fn matches(&self) -> Option<bool> {
        match self.outcome {
            Outcome::Compared {
                source,
                destination,
            } => Some(source == destination),
            Outcome::Unverified { .. } => None,
        }
    }
}

/// The illustrative join run against the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCheck {
    pub sql: String,
    /// Only present for joins derived from a foreign key
    pub source: Option<CountOutcome>,
    pub destination: CountOutcome,
}

impl JoinCheck {
    /// `Some(false)` only when both sides ran and returned different counts
    pub fn matches(&self) -> Option<bool> {
        match (&self.source, &self.destination) {
            (_, Err(_)) => None,
            (Some(Ok(s)), Ok(d)) => Some(s == d),
            (Some(Err(_)), Ok(_)) => None,
            (None, Ok(_)) => Some(true),
        }
    }
}

/// Full verification output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub results: Vec<VerificationResult>,
    pub join: Option<JoinCheck>,
}

impl VerificationReport {
    pub fn matched(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.matches() == Some(true))
            .count()
    }

    pub fn mismatched(&self) -> Vec<&VerificationResult> {
        self.results
            .iter()
            .filter(|r| r.matches() == Some(false))
            .collect()
    }

    pub fn unverified(&self) -> Vec<&VerificationResult> {
        self.results
            .iter()
            .filter(|r| r.matches().is_none())
            .collect()
    }

    /// No count mismatches and the join (if any) did not disagree
    pub fn is_success(&self) -> bool {
        self.mismatched().is_empty()
            && self
                .join
                .as_ref()
                .map(|j| j.matches() != Some(false))
                .unwrap_or(true)
    }
}

/// Build a join count from the first usable foreign key
///
/// A foreign key is usable when its parent is among `tables` and its
/// referenced columns are known (explicitly, or through the parent's primary
/// key).
pub fn derive_join_query(tables: &[TableDescriptor]) -> Option<String> {
    for child in tables {
        for fk in &child.foreign_keys {
            if fk.is_self_reference(&child.name) {
                continue;
            }
            let Some(parent) = tables
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(&fk.referenced_table))
            else {
                continue;
            };

            let parent_columns = if fk.referenced_columns.is_empty() {
                &parent.primary_key
            } else {
                &fk.referenced_columns
            };
            if parent_columns.len() != fk.columns.len() || fk.columns.is_empty() {
                continue;
            }

            let on = fk
                .columns
                .iter()
                .zip(parent_columns)
                .map(|(c, p)| {
                    format!(
                        "c.{} = p.{}",
                        sqlite::quote_ident(c),
                        sqlite::quote_ident(p)
                    )
                })
                .collect::<Vec<_>>()
                .join(" AND ");

            return Some(format!(
                "SELECT COUNT(*) FROM {} c JOIN {} p ON {}",
                sqlite::quote_ident(&child.name),
                sqlite::quote_ident(&parent.name),
                on
            ));
        }
    }
    None
}

/// Accept only a single read query for the caller-supplied join
pub fn validate_join_query(sql: &str) -> Result<String> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    let lower = trimmed.to_lowercase();

    if !(lower.starts_with("select") || lower.starts_with("with")) {
        bail!("Join query must be a SELECT statement");
    }
    if trimmed.contains(';') {
        bail!("Join query must be a single statement");
    }
    Ok(trimmed.to_string())
}

/// Everything read from the SQLite side in one blocking pass
struct SourceSide {
    /// (canonical table name, count)
    counts: Vec<(String, CountOutcome)>,
    join_sql: Option<String>,
    join_count: Option<CountOutcome>,
}

fn read_source(path: &Path, tables: &[String], derive_join: bool) -> Result<SourceSide> {
    let conn = sqlite::open_source(path)?;
    let known = sqlite::list_tables(&conn)?;

    let requested: Vec<String> = if tables.is_empty() {
        known.clone()
    } else {
        tables
            .iter()
            .map(|t| {
                known
                    .iter()
                    .find(|k| k.eq_ignore_ascii_case(t))
                    .cloned()
                    .unwrap_or_else(|| t.clone())
            })
            .collect()
    };

    let counts = requested
        .iter()
        .map(|t| {
            let count = sqlite::count_rows(&conn, t).map_err(|e| format!("{:#}", e));
            (t.clone(), count)
        })
        .collect();

    let (join_sql, join_count) = if derive_join {
        // Tables that fail introspection simply do not contribute a join
        let descriptors: Vec<TableDescriptor> = requested
            .iter()
            .filter_map(|t| sqlite::describe_table(&conn, t).ok())
            .collect();
        match derive_join_query(&descriptors) {
            Some(sql) => {
                let count = sqlite::reader::query_count(&conn, &sql).map_err(|e| format!("{:#}", e));
                (Some(sql), Some(count))
            }
            None => (None, None),
        }
    } else {
        (None, None)
    };

    Ok(SourceSide {
        counts,
        join_sql,
        join_count,
    })
}

/// Compare source and destination for `tables` (all source tables when empty)
///
/// A missing source file is fatal and detected before any query runs.
/// Per-table failures on either side are reported as unverified rather than
/// aborting. When `join_query` is `None`, a join is derived from the first
/// foreign key and run on both sides; otherwise the supplied query is run on
/// the destination only.
pub async fn verify_migration(
    source_path: &Path,
    client: &mut Client,
    schema: &str,
    tables: &[String],
    join_query: Option<&str>,
) -> Result<VerificationReport> {
    sqlite::ensure_source_exists(source_path)?;

    let supplied_join = join_query.map(validate_join_query).transpose()?;

    let path: PathBuf = source_path.to_path_buf();
    let requested = tables.to_vec();
    let derive_join = supplied_join.is_none();
    let source = tokio::task::spawn_blocking(move || read_source(&path, &requested, derive_join))
        .await
        .context("Source verification task panicked")??;

    let mut results = Vec::with_capacity(source.counts.len());
    for (table, source_count) in source.counts {
        let destination_count = postgres::count_rows(client, schema, &table)
            .await
            .map_err(|e| format!("{:#}", e));
        results.push(VerificationResult::new(&table, source_count, destination_count));
    }

    let join = match (supplied_join, source.join_sql) {
        (Some(sql), _) => {
            let destination = postgres::query_count(client, schema, &sql)
                .await
                .map_err(|e| format!("{:#}", e));
            Some(JoinCheck {
                sql,
                source: None,
                destination,
            })
        }
        (None, Some(sql)) => {
            let destination = postgres::query_count(client, schema, &sql)
                .await
                .map_err(|e| format!("{:#}", e));
            Some(JoinCheck {
                sql,
                source: source.join_count,
                destination,
            })
        }
        (None, None) => None,
    };

    Ok(VerificationReport { results, join })
}
