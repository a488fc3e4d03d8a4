// ABOUTME: Table descriptors and the schema manifest written next to exported data
// ABOUTME: Captures columns, primary keys, and foreign keys in declaration order

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Manifest format version written to `schema.json`
pub const MANIFEST_VERSION: u32 = 1;

/// File name of the schema manifest inside an export directory
pub const MANIFEST_FILE: &str = "schema.json";

/// A single column as declared in the source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type as written in the source DDL (may be empty)
    pub declared_type: String,
    pub nullable: bool,
    /// 0 when the column is not part of the primary key, otherwise its 1-based key position
    pub primary_key_position: u32,
}

impl ColumnDescriptor {
    pub fn is_primary_key(&self) -> bool {
        self.primary_key_position > 0
    }
}

/// A foreign key constraint from one table to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub id: i64,
    pub columns: Vec<String>,
    pub referenced_table: String,
    /// Empty when the constraint targets the referenced table's primary key implicitly
    pub referenced_columns: Vec<String>,
    pub on_delete: String,
    pub on_update: String,
}

impl ForeignKeyRef {
    /// Returns true if the constraint points back at its own table
    pub fn is_self_reference(&self, table: &str) -> bool {
        self.referenced_table.eq_ignore_ascii_case(table)
    }
}

/// Structural metadata of one table, independent of its rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key column names in key order
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
    /// Row count observed when the table was exported
    pub row_count: i64,
}

impl TableDescriptor {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Names of the other tables this table references, in declaration order, deduplicated
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps: Vec<String> = Vec::new();
        for fk in &self.foreign_keys {
            if fk.is_self_reference(&self.name) {
                continue;
            }
            if !deps
                .iter()
                .any(|d| d.eq_ignore_ascii_case(&fk.referenced_table))
            {
                deps.push(fk.referenced_table.clone());
            }
        }
        deps
    }
}

/// One exported table: its descriptor plus where its rows live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub table: TableDescriptor,
    /// Data file name relative to the export directory
    pub data_file: String,
    /// Lowercase hex sha256 of the data file
    pub sha256: String,
}

/// Sidecar schema description of a full export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaManifest {
    pub version: u32,
    pub source: String,
    pub exported_at: chrono::DateTime<chrono::Utc>,
    pub sqlite_version: String,
    pub tables: Vec<ManifestEntry>,
}

impl SchemaManifest {
    pub fn new(source: &str, sqlite_version: &str) -> Self {
        Self {
            version: MANIFEST_VERSION,
            source: source.to_string(),
            exported_at: chrono::Utc::now(),
            sqlite_version: sqlite_version.to_string(),
            tables: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&ManifestEntry> {
        self.tables
            .iter()
            .find(|e| e.table.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|e| e.table.name.clone()).collect()
    }

    pub fn descriptors(&self) -> Vec<TableDescriptor> {
        self.tables.iter().map(|e| e.table.clone()).collect()
    }

    /// Write the manifest as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize schema manifest")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write schema manifest to {}", path.display()))?;
        Ok(())
    }

    /// Read a manifest, rejecting versions this build does not understand
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read schema manifest {}. Run the export step first.",
                path.display()
            )
        })?;
        let manifest: SchemaManifest = serde_json::from_str(&content)
            .with_context(|| format!("Invalid schema manifest {}", path.display()))?;

        if manifest.version != MANIFEST_VERSION {
            bail!(
                "Unsupported schema manifest version {} (expected {})",
                manifest.version,
                MANIFEST_VERSION
            );
        }

        Ok(manifest)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::table;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_dependencies_skip_self_references_and_duplicates() {
        let mut employees = table("Employees", &["Departments", "Employees"]);
        employees.foreign_keys.push(employees.foreign_keys[0].clone());

        assert_eq!(employees.dependencies(), vec!["Departments".to_string()]);
    }

    #[test]
    fn test_manifest_preserves_key_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let mut order_items = table("OrderItems", &["Orders", "Products"]);
        order_items.primary_key = vec!["OrdersId".to_string(), "ProductsId".to_string()];

        let mut manifest = SchemaManifest::new("shop.db", "3.44.0");
        manifest.tables.push(ManifestEntry {
            table: order_items.clone(),
            data_file: "OrderItems.csv".to_string(),
            sha256: "00".to_string(),
        });
        manifest.save(&path).unwrap();

        let loaded = SchemaManifest::load(&path).unwrap();
        let restored = &loaded.table("orderitems").unwrap().table;
        assert_eq!(restored.primary_key, order_items.primary_key);
        assert_eq!(restored.foreign_keys, order_items.foreign_keys);
        assert_eq!(loaded.table_names(), vec!["OrderItems".to_string()]);
    }

    #[test]
    fn test_manifest_rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let mut manifest = SchemaManifest::new("shop.db", "3.44.0");
        manifest.version = 99;
        manifest.save(&path).unwrap();

        let err = SchemaManifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported schema manifest version"));
    }

    #[test]
    fn test_missing_manifest_mentions_export() {
        let dir = tempdir().unwrap();
        let err = SchemaManifest::load(&dir.path().join(MANIFEST_FILE)).unwrap_err();
        assert!(err.to_string().contains("Run the export step first"));
    }
}
