// ABOUTME: Relocates loose project files into scripts/, sql/, data/, exports/, and docs/
// ABOUTME: Never overwrites an existing file; supports dry runs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Files whose extension matches go into `folder`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FolderRule {
    pub folder: String,
    pub extensions: Vec<String>,
}

impl FolderRule {
    fn new(folder: &str, extensions: &[&str]) -> Self {
        Self {
            folder: folder.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn matches(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

pub fn default_rules() -> Vec<FolderRule> {
    vec![
        FolderRule::new("scripts", &["ps1", "sh", "bat", "cmd"]),
        FolderRule::new("sql", &["sql"]),
        FolderRule::new("data", &["db", "sqlite", "sqlite3"]),
        FolderRule::new("exports", &["csv", "json"]),
        FolderRule::new("docs", &["md", "txt"]),
    ]
}

/// Files that stay at the project root regardless of extension
const PINNED_FILES: &[&str] = &["Cargo.toml", "Cargo.lock"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Default)]
pub struct OrganizeSummary {
    pub moved: Vec<PlannedMove>,
    /// Moves not made because the destination already exists
    pub conflicts: Vec<PlannedMove>,
}

/// Work out which files in `root` belong in a rule folder
///
/// Only direct children of `root` are considered. The result is sorted by
/// file name so dry runs print in a stable order.
pub fn plan_moves(root: &Path, rules: &[FolderRule]) -> Result<Vec<PlannedMove>> {
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("Failed to read directory {}", root.display()))?;

    let mut plan = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", root.display()))?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || PINNED_FILES.contains(&name.as_str()) {
            continue;
        }

        let Some(extension) = Path::new(&name).extension().and_then(|e| e.to_str()) else {
            continue;
        };

        if let Some(rule) = rules.iter().find(|r| r.matches(extension)) {
            plan.push(PlannedMove {
                from: entry.path(),
                to: root.join(&rule.folder).join(&name),
            });
        }
    }

    plan.sort_by(|a, b| a.from.cmp(&b.from));
    Ok(plan)
}

/// Carry out a plan, or only report it when `dry_run` is set
pub fn apply_moves(plan: Vec<PlannedMove>, dry_run: bool) -> Result<OrganizeSummary> {
    let mut summary = OrganizeSummary::default();

    for planned in plan {
        if planned.to.exists() {
            tracing::warn!(
                "⚠ {} already exists, leaving {} in place",
                planned.to.display(),
                planned.from.display()
            );
            summary.conflicts.push(planned);
            continue;
        }

        if dry_run {
            tracing::info!(
                "  would move {} -> {}",
                planned.from.display(),
                planned.to.display()
            );
        } else {
            if let Some(parent) = planned.to.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::rename(&planned.from, &planned.to).with_context(|| {
                format!(
                    "Failed to move {} to {}",
                    planned.from.display(),
                    planned.to.display()
                )
            })?;
            tracing::info!(
                "  ✓ {} -> {}",
                planned.from.display(),
                planned.to.display()
            );
        }
        summary.moved.push(planned);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), name).unwrap();
    }

    #[test]
    fn test_plan_sorts_files_into_folders() {
        let dir = tempdir().unwrap();
        for name in [
            "deploy.ps1",
            "schema.sql",
            "shop.db",
            "Orders.csv",
            "README.md",
            "Cargo.toml",
            ".env.json",
            "main.rs",
        ] {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("notes.txt")).unwrap();

        let plan = plan_moves(dir.path(), &default_rules()).unwrap();
        let targets: Vec<String> = plan
            .iter()
            .map(|m| {
                m.to.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();

        assert_eq!(
            targets,
            vec![
                "exports/Orders.csv",
                "docs/README.md",
                "scripts/deploy.ps1",
                "sql/schema.sql",
                "data/shop.db",
            ]
        );
    }

    #[test]
    fn test_apply_moves_files_and_keeps_existing() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "load.SQL");
        touch(dir.path(), "notes.txt");
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("notes.txt"), "keep me").unwrap();

        let plan = plan_moves(dir.path(), &default_rules()).unwrap();
        let summary = apply_moves(plan, false).unwrap();

        assert_eq!(summary.moved.len(), 1);
        assert!(dir.path().join("sql").join("load.SQL").exists());
        assert!(!dir.path().join("load.SQL").exists());

        assert_eq!(summary.conflicts.len(), 1);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("docs").join("notes.txt")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "run.sh");

        let plan = plan_moves(dir.path(), &default_rules()).unwrap();
        let summary = apply_moves(plan, true).unwrap();

        assert_eq!(summary.moved.len(), 1);
        assert!(dir.path().join("run.sh").exists());
        assert!(!dir.path().join("scripts").exists());
    }

    #[test]
    fn test_custom_rules_replace_defaults() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "report.xlsx");
        touch(dir.path(), "run.sh");

        let rules = vec![FolderRule::new("reports", &[".xlsx"])];
        let plan = plan_moves(dir.path(), &rules).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].to, dir.path().join("reports").join("report.xlsx"));
    }
}
