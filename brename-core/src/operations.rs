use crate::config::Config;
use crate::executor::{execute_plan, ExecuteOptions};
use crate::output::{Diagnostic, RenameReport, RenamedFile, RevertReport};
use crate::planner::{RenameCriteria, Status};
use crate::revert::{execute_latest, RevertLog};
use crate::session::RenameSession;
use anyhow::{bail, Result};

/// A complete batch-rename request as a front end would submit it.
#[derive(Debug, Clone)]
pub struct RenameRequest {
    pub start_index: u32,
    pub use_regex: bool,
    pub include_ext: bool,
    pub find: String,
    pub replace: String,
    pub test_mode: bool,
    pub allow_revert: bool,
    /// Paths or URIs; missing files and duplicates are dropped.
    pub files: Vec<String>,
}

impl Default for RenameRequest {
    fn default() -> Self {
        Self {
            start_index: 1,
            use_regex: false,
            include_ext: false,
            find: String::new(),
            replace: String::new(),
            test_mode: false,
            allow_revert: false,
            files: Vec::new(),
        }
    }
}

/// Plan and execute a batch rename. The plan is refused wholesale when any
/// entry would collide, in which case the report carries only diagnostics.
pub fn rename_operation(request: &RenameRequest, config: &Config) -> Result<RenameReport> {
    let mut session = RenameSession::new(config.clone());
    session.add_files(request.files.iter().map(String::as_str));
    if session.entries().is_empty() {
        bail!("No source files");
    }

    session.prepare_plugins(&request.replace, false);

    let criteria = RenameCriteria {
        start_index: request.start_index,
        use_regex: request.use_regex,
        include_ext: request.include_ext,
        find: request.find.clone(),
        replace: request.replace.clone(),
    };
    let outcome = session.plan(&criteria)?;

    let diagnostics: Vec<Diagnostic> = session
        .entries()
        .iter()
        .filter(|e| e.status != Status::Renamed)
        .map(|e| Diagnostic {
            source: e.source.clone(),
            status: e.status.describe(session.entries()),
        })
        .collect();

    if !outcome.valid {
        return Ok(RenameReport {
            renamed: Vec::new(),
            diagnostics,
            count: 0,
            test_mode: request.test_mode,
            executed: false,
        });
    }

    let allow_revert = request.allow_revert || config.allow_revert;
    let mut log = if allow_revert && !request.test_mode {
        Some(RevertLog::new(config.revert_dir.clone()))
    } else {
        None
    };

    let options = ExecuteOptions {
        test_mode: request.test_mode,
    };
    let result = execute_plan(&outcome.plan, &options, log.as_mut());
    // The script must be finalized even when a move failed part-way, so the
    // completed portion stays revertible.
    let closed = match log.as_mut() {
        Some(log) => log.close().map(|_| ()),
        None => Ok(()),
    };
    let exec = result?;
    closed?;

    Ok(RenameReport {
        renamed: exec
            .lines
            .into_iter()
            .map(|(source, new_name)| RenamedFile { source, new_name })
            .collect(),
        diagnostics,
        count: exec.renamed,
        test_mode: request.test_mode,
        executed: true,
    })
}

/// Replay the most recent revert script from the configured directory.
pub fn revert_operation(config: &Config) -> Result<RevertReport> {
    let restored = execute_latest(&config.revert_dir)?;
    Ok(RevertReport { restored })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        path
    }

    fn test_config(temp: &TempDir) -> Config {
        Config {
            revert_dir: temp.path().join("revert"),
            allow_revert: false,
            macros: Vec::new(),
        }
    }

    fn request(find: &str, replace: &str, files: &[PathBuf]) -> RenameRequest {
        RenameRequest {
            find: find.to_string(),
            replace: replace.to_string(),
            files: files
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            ..RenameRequest::default()
        }
    }

    #[test]
    fn test_rename_operation_renames_files() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let a = touch(temp.path(), "IMG_001.jpg");
        let b = touch(temp.path(), "IMG_002.jpg");

        let req = request("IMG", "photo", &[a.clone(), b.clone()]);
        let report = rename_operation(&req, &config).unwrap();

        assert!(report.executed);
        assert_eq!(report.count, 2);
        assert!(temp.path().join("photo_001.jpg").exists());
        assert!(temp.path().join("photo_002.jpg").exists());
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_rename_operation_no_files() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);

        let req = request("a", "b", &[temp.path().join("missing.txt")]);
        let err = rename_operation(&req, &config).unwrap_err();
        assert!(err.to_string().contains("No source files"));
    }

    #[test]
    fn test_rename_operation_refuses_conflicting_plan() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let a = touch(temp.path(), "a1.txt");
        let b = touch(temp.path(), "a2.txt");

        // Both files map to "a.txt": the second conflicts with the first.
        let mut req = request(r"\d", "", &[a.clone(), b.clone()]);
        req.use_regex = true;
        let report = rename_operation(&req, &config).unwrap();

        assert!(!report.executed);
        assert_eq!(report.count, 0);
        assert!(a.exists());
        assert!(b.exists());
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.status.starts_with("Conflicts with file:")));
    }

    #[test]
    fn test_rename_operation_test_mode() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let a = touch(temp.path(), "a.txt");

        let mut req = request("a", "b", &[a.clone()]);
        req.test_mode = true;
        let report = rename_operation(&req, &config).unwrap();

        assert!(report.executed);
        assert!(report.test_mode);
        assert_eq!(report.count, 0);
        assert_eq!(report.renamed.len(), 1);
        assert_eq!(report.renamed[0].new_name, "b.txt");
        assert!(a.exists());
    }

    #[test]
    fn test_rename_then_revert_roundtrip() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let a = touch(temp.path(), "a.txt");
        let b = touch(temp.path(), "b.txt");

        let mut req = request("", "file-%n", &[a.clone(), b.clone()]);
        req.allow_revert = true;
        let report = rename_operation(&req, &config).unwrap();
        assert_eq!(report.count, 2);
        assert!(temp.path().join("file-1.txt").exists());
        assert!(temp.path().join("file-2.txt").exists());

        let revert = revert_operation(&config).unwrap();
        assert_eq!(revert.restored, 2);
        assert!(a.exists());
        assert!(b.exists());
    }

    #[test]
    fn test_revert_operation_without_script() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);

        let err = revert_operation(&config).unwrap_err();
        assert!(err.to_string().contains("doesn't exist"));
    }

    #[test]
    fn test_config_allow_revert_enables_log() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.allow_revert = true;
        let a = touch(temp.path(), "a.txt");

        let req = request("a", "z", &[a]);
        rename_operation(&req, &config).unwrap();

        assert!(config.revert_dir.join(crate::revert::LATEST_SCRIPT).exists());
    }
}
