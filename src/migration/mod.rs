// ABOUTME: Migration module for the SQLite to PostgreSQL round trip
// ABOUTME: Handles schema descriptors, export, import, and verification

pub mod codec;
pub mod descriptor;
pub mod export;
pub mod import;
pub mod typemap;
pub mod verify;

pub use descriptor::{
    ColumnDescriptor, ForeignKeyRef, ManifestEntry, SchemaManifest, TableDescriptor,
    MANIFEST_FILE,
};
pub use export::{export_database, ExportSummary, SkippedTable};
pub use import::{creation_order, import_export, ImportOptions, ImportSummary, TableLoad};
pub use verify::{verify_migration, Outcome, VerificationReport, VerificationResult};
