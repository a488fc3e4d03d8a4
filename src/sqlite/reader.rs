// ABOUTME: SQLite schema introspection and row reading
// ABOUTME: Builds table descriptors from PRAGMA output and streams rows as cell values

use super::{quote_ident, validate_table_name};
use crate::migration::codec::CellValue;
use crate::migration::descriptor::{ColumnDescriptor, ForeignKeyRef, TableDescriptor};
use anyhow::{bail, Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};

/// List user tables in declaration order, skipping SQLite internal tables
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY rowid",
        )
        .context("Failed to query sqlite_master")?;

    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("Failed to list tables")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read table list")?;

    tracing::debug!("Found {} tables in source", tables.len());
    Ok(tables)
}

/// Resolve a table name case-insensitively to its declared spelling
fn resolve_table(conn: &Connection, table: &str) -> Result<String> {
    validate_table_name(table)?;

    match declared_table_name(conn, table)? {
        Some(name) => Ok(name),
        None => bail!("Table '{}' does not exist in source database", table),
    }
}

fn declared_table_name(conn: &Connection, table: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        params![table],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("Failed to look up table '{}'", table))
}

fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
        .with_context(|| format!("Failed to read columns of '{}'", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("Failed to read columns of '{}'", table))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read columns of '{}'", table))?;
    Ok(names)
}

/// Introspect one table into a descriptor
///
/// Columns come from `PRAGMA table_info`, foreign keys from
/// `PRAGMA foreign_key_list`. SQLite reports foreign keys with the last
/// declared constraint as id 0, so they are re-sorted into declaration order.
pub fn describe_table(conn: &Connection, table: &str) -> Result<TableDescriptor> {
    let name = resolve_table(conn, table)?;
    let quoted = quote_ident(&name);

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quoted))
        .with_context(|| format!("Failed to read columns of '{}'", name))?;
    let columns = stmt
        .query_map([], |row| {
            let not_null: i64 = row.get(3)?;
            let pk: i64 = row.get(5)?;
            Ok(ColumnDescriptor {
                name: row.get(1)?,
                declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                nullable: not_null == 0 && pk == 0,
                primary_key_position: pk.max(0) as u32,
            })
        })
        .with_context(|| format!("Failed to read columns of '{}'", name))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read columns of '{}'", name))?;

    if columns.is_empty() {
        bail!("Table '{}' has no columns", name);
    }

    let mut pk_columns: Vec<&ColumnDescriptor> =
        columns.iter().filter(|c| c.is_primary_key()).collect();
    pk_columns.sort_by_key(|c| c.primary_key_position);
    let primary_key = pk_columns.iter().map(|c| c.name.clone()).collect();

    let foreign_keys = read_foreign_keys(conn, &name)?;
    let row_count = count_rows(conn, &name)?;

    Ok(TableDescriptor {
        name,
        columns,
        primary_key,
        foreign_keys,
        row_count,
    })
}

fn read_foreign_keys(conn: &Connection, table: &str) -> Result<Vec<ForeignKeyRef>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(table)))
        .with_context(|| format!("Failed to read foreign keys of '{}'", table))?;

    // (id, seq, table, from, to, on_update, on_delete)
    let mut rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .with_context(|| format!("Failed to read foreign keys of '{}'", table))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read foreign keys of '{}'", table))?;

    rows.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut foreign_keys: Vec<ForeignKeyRef> = Vec::new();
    for (id, _seq, target, from, to, on_update, on_delete) in rows {
        match foreign_keys.last_mut() {
            Some(fk) if fk.id == id => {
                fk.columns.push(from);
                if let Some(to) = to {
                    fk.referenced_columns.push(to);
                }
            }
            _ => foreign_keys.push(ForeignKeyRef {
                id,
                columns: vec![from],
                referenced_table: target,
                referenced_columns: to.into_iter().collect(),
                on_delete,
                on_update,
            }),
        }
    }

    for fk in &mut foreign_keys {
        canonicalize_reference(conn, fk)?;
    }

    Ok(foreign_keys)
}

/// Rewrite a foreign key's target to the parent's declared spelling
///
/// SQLite matches REFERENCES names without regard to case; the destination
/// quotes identifiers, so `customers(id)` must become `Customers(Id)`.
/// Targets missing from the source are left as written.
fn canonicalize_reference(conn: &Connection, fk: &mut ForeignKeyRef) -> Result<()> {
    let Some(parent) = declared_table_name(conn, &fk.referenced_table)? else {
        return Ok(());
    };

    if !fk.referenced_columns.is_empty() {
        let parent_columns = column_names(conn, &parent)?;
        for column in &mut fk.referenced_columns {
            if let Some(declared) = parent_columns
                .iter()
                .find(|c| c.eq_ignore_ascii_case(column))
            {
                *column = declared.clone();
            }
        }
    }

    fk.referenced_table = parent;
    Ok(())
}

/// Count rows in a table
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    validate_table_name(table)?;
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )
    .with_context(|| format!("Failed to count rows in '{}'", table))
}

/// Run a scalar count query such as a verification join
pub fn query_count(conn: &Connection, sql: &str) -> Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("Failed to run count query: {}", sql))
}

/// Read every row of a table, handing each one to `on_row`
///
/// Returns the number of rows read.
pub fn stream_rows<F>(conn: &Connection, table: &TableDescriptor, mut on_row: F) -> Result<u64>
where
    F: FnMut(&[CellValue]) -> Result<()>,
{
    let column_list = table
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let order = if has_rowid(conn, &table.name) {
        " ORDER BY rowid".to_string()
    } else if table.has_primary_key() {
        format!(
            " ORDER BY {}",
            table
                .primary_key
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        )
    } else {
        String::new()
    };
    let sql = format!(
        "SELECT {} FROM {}{}",
        column_list,
        quote_ident(&table.name),
        order
    );

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("Failed to prepare row query for '{}'", table.name))?;
    let mut rows = stmt
        .query([])
        .with_context(|| format!("Failed to read rows from '{}'", table.name))?;

    let width = table.columns.len();
    let mut cells = Vec::with_capacity(width);
    let mut count = 0u64;

    while let Some(row) = rows
        .next()
        .with_context(|| format!("Failed to read row from '{}'", table.name))?
    {
        cells.clear();
        for (idx, column) in table.columns.iter().enumerate() {
            let value = row.get_ref(idx).with_context(|| {
                format!("Failed to read column {} of '{}'", column.name, table.name)
            })?;
            let cell = to_cell(value).with_context(|| {
                format!(
                    "{}.{} in row {} is not valid UTF-8 text",
                    table.name,
                    column.name,
                    count + 1
                )
            })?;
            cells.push(cell);
        }
        on_row(&cells)?;
        count += 1;
    }

    Ok(count)
}

/// WITHOUT ROWID tables reject a bare `rowid` reference
fn has_rowid(conn: &Connection, table: &str) -> bool {
    conn.prepare(&format!("SELECT rowid FROM {} LIMIT 0", quote_ident(table)))
        .is_ok()
}

fn to_cell(value: ValueRef<'_>) -> std::result::Result<CellValue, std::str::Utf8Error> {
    Ok(match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Real(f),
        ValueRef::Text(bytes) => CellValue::Text(std::str::from_utf8(bytes)?.to_string()),
        ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::shop_database;
    use super::*;
    use crate::sqlite::open_source;
    use tempfile::tempdir;

    #[test]
    fn test_list_tables_in_declaration_order() {
        let dir = tempdir().unwrap();
        let conn = open_source(&shop_database(dir.path())).unwrap();

        assert_eq!(list_tables(&conn).unwrap(), vec!["Customers", "Orders"]);
    }

    #[test]
    fn test_describe_table_captures_keys() {
        let dir = tempdir().unwrap();
        let conn = open_source(&shop_database(dir.path())).unwrap();

        let orders = describe_table(&conn, "orders").unwrap();
        assert_eq!(orders.name, "Orders");
        assert_eq!(orders.primary_key, vec!["Id"]);
        assert_eq!(orders.row_count, 5);
        assert_eq!(
            orders.column_names(),
            vec!["Id", "CustomerId", "Total", "Receipt"]
        );
        assert!(!orders.columns[1].nullable);
        assert!(orders.columns[2].nullable);
        assert_eq!(orders.columns[2].declared_type, "DECIMAL(10,2)");

        assert_eq!(orders.foreign_keys.len(), 1);
        let fk = &orders.foreign_keys[0];
        assert_eq!(fk.columns, vec!["CustomerId"]);
        assert_eq!(fk.referenced_table, "Customers");
        assert_eq!(fk.referenced_columns, vec!["Id"]);
        assert_eq!(fk.on_delete, "CASCADE");
    }

    #[test]
    fn test_foreign_keys_keep_declaration_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("links.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE A (Id INTEGER PRIMARY KEY);
             CREATE TABLE B (Id INTEGER PRIMARY KEY);
             CREATE TABLE Link (
                 AId INTEGER REFERENCES A(Id),
                 BId INTEGER REFERENCES B,
                 PRIMARY KEY (BId, AId)
             );",
        )
        .unwrap();

        let link = describe_table(&conn, "Link").unwrap();
        let targets: Vec<_> = link
            .foreign_keys
            .iter()
            .map(|fk| fk.referenced_table.as_str())
            .collect();
        assert_eq!(targets, vec!["A", "B"]);
        // Implicit primary key reference
        assert!(link.foreign_keys[1].referenced_columns.is_empty());
        // Composite key keeps key order, not column order
        assert_eq!(link.primary_key, vec!["BId", "AId"]);
    }

    #[test]
    fn test_foreign_key_target_uses_declared_spelling() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("case.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Customers (Id INTEGER PRIMARY KEY, Name TEXT);
             CREATE TABLE Orders (
                 Id INTEGER PRIMARY KEY,
                 CustomerId INTEGER REFERENCES customers(id),
                 ExternalId INTEGER REFERENCES Elsewhere(Code)
             );",
        )
        .unwrap();

        let orders = describe_table(&conn, "Orders").unwrap();
        assert_eq!(orders.foreign_keys[0].referenced_table, "Customers");
        assert_eq!(orders.foreign_keys[0].referenced_columns, vec!["Id"]);
        // Targets outside the file are kept as written
        assert_eq!(orders.foreign_keys[1].referenced_table, "Elsewhere");
        assert_eq!(orders.foreign_keys[1].referenced_columns, vec!["Code"]);
    }

    #[test]
    fn test_stream_rows_rejects_invalid_utf8_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad_text.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Notes (Id INTEGER PRIMARY KEY, Body TEXT);
             INSERT INTO Notes VALUES (1, 'fine');
             INSERT INTO Notes VALUES (2, CAST(X'61FF62' AS TEXT));",
        )
        .unwrap();

        let notes = describe_table(&conn, "Notes").unwrap();
        let err = stream_rows(&conn, &notes, |_| Ok(())).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Notes.Body in row 2 is not valid UTF-8"));
    }

    #[test]
    fn test_stream_rows_follows_rowid_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ordered.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Tags (Name TEXT UNIQUE);
             INSERT INTO Tags VALUES ('zeta');
             INSERT INTO Tags VALUES ('alpha');
             INSERT INTO Tags VALUES ('mid');
             CREATE TABLE Codes (Code TEXT PRIMARY KEY, Label TEXT) WITHOUT ROWID;
             INSERT INTO Codes VALUES ('b', 'second');
             INSERT INTO Codes VALUES ('a', 'first');",
        )
        .unwrap();

        let tags = describe_table(&conn, "Tags").unwrap();
        let mut names = Vec::new();
        stream_rows(&conn, &tags, |row| {
            names.push(row[0].clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(
            names,
            vec![
                CellValue::Text("zeta".into()),
                CellValue::Text("alpha".into()),
                CellValue::Text("mid".into()),
            ]
        );

        let codes = describe_table(&conn, "Codes").unwrap();
        let mut keys = Vec::new();
        stream_rows(&conn, &codes, |row| {
            keys.push(row[0].clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(
            keys,
            vec![CellValue::Text("a".into()), CellValue::Text("b".into())]
        );
    }

    #[test]
    fn test_describe_missing_table_fails() {
        let dir = tempdir().unwrap();
        let conn = open_source(&shop_database(dir.path())).unwrap();

        let err = describe_table(&conn, "Reviews").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_stream_rows_converts_values() {
        let dir = tempdir().unwrap();
        let conn = open_source(&shop_database(dir.path())).unwrap();
        let orders = describe_table(&conn, "Orders").unwrap();

        let mut seen = Vec::new();
        let count = stream_rows(&conn, &orders, |row| {
            seen.push(row.to_vec());
            Ok(())
        })
        .unwrap();

        assert_eq!(count, 5);
        assert_eq!(seen[1][0], CellValue::Integer(2));
        assert_eq!(seen[0][2], CellValue::Real(10.5));
        assert_eq!(seen[1][3], CellValue::Blob(vec![0xca, 0xfe]));
        assert_eq!(seen[0][3], CellValue::Null);
    }

    #[test]
    fn test_count_and_join_queries() {
        let dir = tempdir().unwrap();
        let conn = open_source(&shop_database(dir.path())).unwrap();

        assert_eq!(count_rows(&conn, "Customers").unwrap(), 3);
        let joined = query_count(
            &conn,
            "SELECT COUNT(*) FROM \"Orders\" c JOIN \"Customers\" p ON c.\"CustomerId\" = p.\"Id\"",
        )
        .unwrap();
        assert_eq!(joined, 5);
    }
}
