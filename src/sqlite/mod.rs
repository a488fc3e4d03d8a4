// ABOUTME: SQLite source database access for export and verification
// ABOUTME: Provides path checks, read-only connections, and identifier safety

pub mod reader;

pub use reader::{count_rows, describe_table, list_tables, stream_rows};

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

/// How long a read waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Version of the SQLite library linked into this binary
pub fn library_version() -> &'static str {
    rusqlite::version()
}

/// Check that the source database file exists
///
/// This runs before any connection attempt so a mistyped path never creates
/// an empty database or reaches the destination.
///
/// # Examples
///
/// ```
/// # use sqlite_postgres_migrator::sqlite::ensure_source_exists;
/// let err = ensure_source_exists(std::path::Path::new("/no/such/file.db")).unwrap_err();
/// assert!(err.to_string().contains("Source database not found"));
/// ```
pub fn ensure_source_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("Source database not found: {}", path.display());
    }
    if !path.is_file() {
        bail!("Source database path is not a file: {}", path.display());
    }
    Ok(())
}

/// Open the source SQLite database read-only
///
/// # Examples
///
/// ```no_run
/// # use sqlite_postgres_migrator::sqlite::open_source;
/// # fn example() -> anyhow::Result<()> {
/// let conn = open_source(std::path::Path::new("app.db"))?;
/// # Ok(())
/// # }
/// ```
pub fn open_source(path: &Path) -> Result<Connection> {
    ensure_source_exists(path)?;

    tracing::debug!("Opening SQLite database {}", path.display());

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set SQLite busy timeout")?;

    // Catches files that exist but are not SQLite databases
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .with_context(|| format!("{} is not a readable SQLite database", path.display()))?;

    Ok(conn)
}

/// Reject table names that cannot be safely quoted
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Table name cannot be empty");
    }
    if name.chars().any(|c| c.is_control()) {
        bail!(
            "Table name contains control characters: {}",
            crate::utils::sanitize_identifier(name)
        );
    }
    Ok(())
}

/// Quote an identifier with double quotes, escaping embedded quotes
///
/// Works for both SQLite and PostgreSQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
