// ABOUTME: TOML configuration file for migration runs
// ABOUTME: Supplies defaults for source, destination, export, verify, and organize settings

use crate::organize::FolderRule;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when no destination server is given
pub const TARGET_URL_ENV: &str = "MIGRATION_TARGET_URL";

/// Export directory used when neither CLI nor config names one
pub const DEFAULT_EXPORT_DIR: &str = "export";

/// Destination schema used when neither CLI nor config names one
pub const DEFAULT_SCHEMA: &str = "public";

/// Contents of `migration.toml`
///
/// ```toml
/// [source]
/// path = "data/shop.db"
///
/// [destination]
/// server = "postgresql://app@localhost:5432"
/// database = "shop"
/// schema = "public"
///
/// [export]
/// dir = "export"
/// tables = ["Customers", "Orders"]
///
/// [verify]
/// tables = ["Customers", "Orders"]
/// join_query = "SELECT COUNT(*) FROM \"Orders\" o JOIN \"Customers\" c ON o.\"CustomerId\" = c.\"Id\""
///
/// [[organize.rules]]
/// folder = "scripts"
/// extensions = ["ps1", "sh"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub export: ExportConfig,
    pub verify: VerifyConfig,
    pub organize: OrganizeConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationConfig {
    pub server: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub dir: Option<PathBuf>,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    pub tables: Vec<String>,
    pub join_query: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrganizeConfig {
    pub root: Option<PathBuf>,
    pub rules: Vec<FolderRule>,
}

/// Load a config file; `None` yields the empty default
pub fn load_config(path: Option<&Path>) -> Result<MigrationConfig> {
    let Some(path) = path else {
        return Ok(MigrationConfig::default());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: MigrationConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

impl MigrationConfig {
    /// Source path from the CLI, else the config file
    pub fn source_path(&self, cli: Option<PathBuf>) -> Result<PathBuf> {
        match cli.or_else(|| self.source.path.clone()) {
            Some(path) => Ok(path),
            None => bail!("No source database given. Pass --source or set [source].path"),
        }
    }

    pub fn export_dir(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.export.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR))
    }

    pub fn schema(&self, cli: Option<String>) -> String {
        cli.or_else(|| self.destination.schema.clone())
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string())
    }

    /// Destination URL from server and database name
    ///
    /// The server comes from the CLI, the config file, or `MIGRATION_TARGET_URL`,
    /// in that order. Without a database name the server URL is used as is.
    pub fn destination_url(
        &self,
        server: Option<String>,
        database: Option<String>,
    ) -> Result<String> {
        let server = server
            .or_else(|| self.destination.server.clone())
            .or_else(|| std::env::var(TARGET_URL_ENV).ok());
        let Some(server) = server else {
            bail!(
                "No destination server given. Pass --target, set [destination].server, \
                 or export {}",
                TARGET_URL_ENV
            );
        };

        crate::utils::validate_connection_string(&server)?;

        match database.or_else(|| self.destination.database.clone()) {
            Some(database) => crate::postgres::target_url(&server, &database),
            None => Ok(server),
        }
    }

    /// CLI tables when given, otherwise the configured list
    pub fn export_tables(&self, cli: Vec<String>) -> Vec<String> {
        if cli.is_empty() {
            self.export.tables.clone()
        } else {
            cli
        }
    }

    pub fn verify_tables(&self, cli: Vec<String>) -> Vec<String> {
        if cli.is_empty() {
            self.verify.tables.clone()
        } else {
            cli
        }
    }

    pub fn join_query(&self, cli: Option<String>) -> Option<String> {
        cli.or_else(|| self.verify.join_query.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[source]
path = "data/shop.db"

[destination]
server = "postgresql://app@localhost:5432/postgres"
database = "shop"

[export]
tables = ["Customers"]

[verify]
join_query = "SELECT COUNT(*) FROM \"Orders\""

[[organize.rules]]
folder = "reports"
extensions = ["xlsx"]
"#;

    #[test]
    fn test_load_config_and_cli_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("migration.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(
            config.source_path(None).unwrap(),
            PathBuf::from("data/shop.db")
        );
        assert_eq!(
            config.source_path(Some(PathBuf::from("other.db"))).unwrap(),
            PathBuf::from("other.db")
        );
        assert_eq!(
            config.destination_url(None, None).unwrap(),
            "postgresql://app@localhost:5432/shop"
        );
        assert_eq!(
            config
                .destination_url(None, Some("staging".to_string()))
                .unwrap(),
            "postgresql://app@localhost:5432/staging"
        );
        assert_eq!(config.export_dir(None), PathBuf::from("export"));
        assert_eq!(config.schema(None), "public");
        assert_eq!(config.export_tables(vec![]), vec!["Customers"]);
        assert_eq!(
            config.export_tables(vec!["Orders".to_string()]),
            vec!["Orders"]
        );
        assert!(config.join_query(None).unwrap().contains("Orders"));
        assert_eq!(config.organize.rules[0].folder, "reports");
    }

    #[test]
    fn test_missing_config_file_fails() {
        let dir = tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("migration.toml");
        std::fs::write(&path, "[source]\npth = \"typo.db\"\n").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_source_is_required() {
        let config = MigrationConfig::default();
        let err = config.source_path(None).unwrap_err();
        assert!(err.to_string().contains("--source"));
    }
}
