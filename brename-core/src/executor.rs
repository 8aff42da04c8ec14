//! Applies a validated rename plan to the filesystem.

use crate::planner::RenamePlan;
use crate::revert::RevertLog;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Perform every step except the actual move and the after-rename hook.
    pub test_mode: bool,
}

#[derive(Debug, Default)]
pub struct ExecuteReport {
    /// One `(source, new base name)` pair per executed (or dry-run) move.
    pub lines: Vec<(PathBuf, String)>,
    /// Moves actually performed.
    pub renamed: usize,
    /// Moves skipped because the target appeared between planning and
    /// execution.
    pub skipped: usize,
}

/// Execute `plan` in order. Each target is re-verified before the move;
/// raced entries are skipped, not retried, and do not abort the rest.
/// Every successful move is recorded in `revert` when one is supplied.
pub fn execute_plan(
    plan: &RenamePlan,
    options: &ExecuteOptions,
    mut revert: Option<&mut RevertLog>,
) -> Result<ExecuteReport> {
    let mut report = ExecuteReport::default();
    for (source, target) in &plan.moves {
        if target.exists() {
            report.skipped += 1;
            continue;
        }
        if !options.test_mode {
            move_file(source, target)?;
            if let Some(log) = revert.as_deref_mut() {
                log.record(source, target)?;
            }
            report.renamed += 1;
        }
        let new_base = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        report.lines.push((source.clone(), new_base));
    }
    Ok(report)
}

/// Move a file, falling back to copy-then-delete when the storage does not
/// support an atomic rename (non-native or cross-device targets).
pub fn move_file(source: &Path, target: &Path) -> Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    copy_then_delete(source, target)
}

/// Stream-copy `source` to `target`, then delete the source. A failed copy
/// discards the partial target and leaves the source untouched.
fn copy_then_delete(source: &Path, target: &Path) -> Result<()> {
    match fs::copy(source, target) {
        Ok(_) => fs::remove_file(source).with_context(|| {
            format!("failed to remove source after copy: {}", source.display())
        }),
        Err(e) => {
            let _ = fs::remove_file(target);
            Err(e).with_context(|| {
                format!(
                    "failed to move {} to {}",
                    source.display(),
                    target.display()
                )
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plan_for(dir: &TempDir, moves: &[(&str, &str)]) -> RenamePlan {
        RenamePlan {
            moves: moves
                .iter()
                .map(|(from, to)| (dir.path().join(from), dir.path().join(to)))
                .collect(),
        }
    }

    #[test]
    fn test_execute_renames_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "one").unwrap();
        fs::write(dir.path().join("b.txt"), "two").unwrap();
        let plan = plan_for(&dir, &[("a.txt", "x.txt"), ("b.txt", "y.txt")]);

        let report = execute_plan(&plan, &ExecuteOptions::default(), None).unwrap();
        assert_eq!(report.renamed, 2);
        assert_eq!(report.skipped, 0);
        assert!(dir.path().join("x.txt").exists());
        assert!(dir.path().join("y.txt").exists());
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(report.lines[0].1, "x.txt");
    }

    #[test]
    fn test_dry_run_leaves_files_and_reports_outcomes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "one").unwrap();
        let plan = plan_for(&dir, &[("a.txt", "x.txt")]);

        let options = ExecuteOptions { test_mode: true };
        let report = execute_plan(&plan, &options, None).unwrap();
        assert_eq!(report.renamed, 0);
        assert_eq!(report.lines.len(), 1);
        assert!(dir.path().join("a.txt").exists());
        assert!(!dir.path().join("x.txt").exists());
    }

    #[test]
    fn test_raced_target_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "one").unwrap();
        fs::write(dir.path().join("b.txt"), "two").unwrap();
        let plan = plan_for(&dir, &[("a.txt", "x.txt"), ("b.txt", "y.txt")]);
        // The target appears after planning.
        fs::write(dir.path().join("x.txt"), "raced").unwrap();

        let report = execute_plan(&plan, &ExecuteOptions::default(), None).unwrap();
        assert_eq!(report.renamed, 1);
        assert_eq!(report.skipped, 1);
        assert!(dir.path().join("a.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("x.txt")).unwrap(), "raced");
        assert!(dir.path().join("y.txt").exists());
    }

    #[test]
    fn test_copy_then_delete_moves_content() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        let target = dir.path().join("b.txt");
        fs::write(&source, "payload").unwrap();

        copy_then_delete(&source, &target).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "payload");
    }

    #[test]
    fn test_copy_failure_leaves_source_untouched() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("missing.txt");
        let target = dir.path().join("b.txt");

        assert!(copy_then_delete(&source, &target).is_err());
        assert!(!target.exists());
    }
}
