// ABOUTME: Organize command moving loose project files into their folders
// ABOUTME: Prints the plan on dry runs and a summary afterwards

use crate::organize::{self, FolderRule, OrganizeSummary};
use anyhow::Result;
use std::path::Path;

/// Move loose files in `root` into rule folders
///
/// Empty `rules` means the built-in folder layout.
pub fn organize(root: &Path, rules: &[FolderRule], dry_run: bool) -> Result<OrganizeSummary> {
    let rules = if rules.is_empty() {
        organize::default_rules()
    } else {
        rules.to_vec()
    };

    tracing::info!(
        "Organizing {}{}...",
        root.display(),
        if dry_run { " (dry run)" } else { "" }
    );

    let plan = organize::plan_moves(root, &rules)?;
    if plan.is_empty() {
        tracing::info!("✓ Nothing to move");
        return Ok(OrganizeSummary::default());
    }

    let summary = organize::apply_moves(plan, dry_run)?;

    tracing::info!("");
    tracing::info!("========================================");
    tracing::info!("Organize Summary");
    tracing::info!("========================================");
    if dry_run {
        tracing::info!("Would move: {}", summary.moved.len());
    } else {
        tracing::info!("✓ Moved: {}", summary.moved.len());
    }
    tracing::info!("⚠ Left in place (destination exists): {}", summary.conflicts.len());
    tracing::info!("========================================");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_organize_with_default_rules() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("migrate.ps1"), "").unwrap();
        std::fs::write(dir.path().join("shop.sqlite"), "").unwrap();

        let summary = organize(dir.path(), &[], false).unwrap();

        assert_eq!(summary.moved.len(), 2);
        assert!(dir.path().join("scripts/migrate.ps1").exists());
        assert!(dir.path().join("data/shop.sqlite").exists());
    }

    #[test]
    fn test_organize_empty_directory() {
        let dir = tempdir().unwrap();
        let summary = organize(dir.path(), &[], true).unwrap();
        assert!(summary.moved.is_empty());
    }
}
