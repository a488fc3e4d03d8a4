// ABOUTME: CLI entry point for sqlite-postgres-migrator
// ABOUTME: Parses commands, merges config file values, and routes to handlers

use clap::{Args, Parser, Subcommand};
use sqlite_postgres_migrator::commands::{self, MigrateOptions};
use sqlite_postgres_migrator::config::{load_config, MigrationConfig};
use sqlite_postgres_migrator::migration::ImportOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sqlite-postgres-migrator")]
#[command(about = "Migrate a SQLite database into PostgreSQL and verify the result", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to migration.toml supplying defaults for any flag
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct SourceArgs {
    /// SQLite database file
    #[arg(long)]
    source: Option<PathBuf>,
}

#[derive(Args, Clone, Default)]
struct TargetArgs {
    /// Destination server URL (falls back to MIGRATION_TARGET_URL)
    #[arg(long)]
    target: Option<String>,
    /// Destination database name, replacing any database in --target
    #[arg(long)]
    database: Option<String>,
    /// Destination schema (default: public)
    #[arg(long)]
    schema: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the SQLite library, the source file, and destination privileges
    Check {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Export tables to CSV data files plus schema.json
    Export {
        #[command(flatten)]
        source: SourceArgs,
        /// Directory for data files and the schema manifest
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Export only these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
    },
    /// Create the exported tables in the destination and load their rows
    Import {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Drop same-named destination tables first
        #[arg(long)]
        drop_existing: bool,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Compare row counts and a sample join between source and destination
    Verify {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        target: TargetArgs,
        /// Export directory whose manifest lists the tables to compare
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Compare only these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
        /// SELECT COUNT(*) query run on the destination instead of the derived join
        #[arg(long)]
        join_query: Option<String>,
    },
    /// Export, import, and verify in one run
    Migrate {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        export_dir: Option<PathBuf>,
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
        #[arg(long)]
        join_query: Option<String>,
        #[arg(long)]
        drop_existing: bool,
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Move loose files into scripts/, sql/, data/, exports/, and docs/
    Organize {
        /// Project root to tidy (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Report planned moves without touching any file
        #[arg(long)]
        dry_run: bool,
    },
}

fn target_url(config: &MigrationConfig, args: TargetArgs) -> anyhow::Result<String> {
    config.destination_url(args.target, args.database)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { source, target } => {
            let source_path = config.source_path(source.source)?;
            let schema = config.schema(target.schema.clone());
            // The destination is optional for a preflight check
            let has_target = target.target.is_some()
                || config.destination.server.is_some()
                || std::env::var(sqlite_postgres_migrator::config::TARGET_URL_ENV).is_ok();
            let url = if has_target {
                Some(target_url(&config, target)?)
            } else {
                None
            };
            commands::check(&source_path, url.as_deref(), &schema).await
        }
        Commands::Export {
            source,
            export_dir,
            tables,
        } => {
            let source_path = config.source_path(source.source)?;
            let export_dir = config.export_dir(export_dir);
            let tables = config.export_tables(tables);
            commands::export(&source_path, &export_dir, &tables)
                .await
                .map(|_| ())
        }
        Commands::Import {
            target,
            export_dir,
            drop_existing,
            yes,
        } => {
            let options = ImportOptions {
                schema: config.schema(target.schema.clone()),
                drop_existing,
            };
            let url = target_url(&config, target)?;
            let export_dir = config.export_dir(export_dir);
            commands::import(&url, &export_dir, &options, yes)
                .await
                .map(|_| ())
        }
        Commands::Verify {
            source,
            target,
            export_dir,
            tables,
            join_query,
        } => {
            let source_path = config.source_path(source.source)?;
            let schema = config.schema(target.schema.clone());
            let url = target_url(&config, target)?;
            let export_dir = config.export_dir(export_dir);
            let tables = config.verify_tables(tables);
            let join_query = config.join_query(join_query);
            commands::verify(
                &source_path,
                &url,
                &schema,
                &tables,
                join_query.as_deref(),
                Some(&export_dir),
            )
            .await
            .map(|_| ())
        }
        Commands::Migrate {
            source,
            target,
            export_dir,
            tables,
            join_query,
            drop_existing,
            yes,
        } => {
            let source_path = config.source_path(source.source)?;
            let import = ImportOptions {
                schema: config.schema(target.schema.clone()),
                drop_existing,
            };
            let url = target_url(&config, target)?;
            let export_dir = config.export_dir(export_dir);
            let tables = config.export_tables(tables);
            let join_query = config.join_query(join_query);
            commands::migrate(MigrateOptions {
                source_path: &source_path,
                target_url: &url,
                export_dir: &export_dir,
                tables: &tables,
                join_query: join_query.as_deref(),
                import,
                skip_confirmation: yes,
            })
            .await
            .map(|_| ())
        }
        Commands::Organize { root, dry_run } => {
            let root = root
                .or_else(|| config.organize.root.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            commands::organize(&root, &config.organize.rules, dry_run).map(|_| ())
        }
    }
}
