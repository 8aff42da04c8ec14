use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One executed (or dry-run) move.
#[derive(Debug, Clone, Serialize)]
pub struct RenamedFile {
    pub source: PathBuf,
    pub new_name: String,
}

/// Per-file status for entries that were not renamed.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub source: PathBuf,
    pub status: String,
}

/// Result of a rename operation, serializable for machine consumers.
#[derive(Debug, Serialize)]
pub struct RenameReport {
    pub renamed: Vec<RenamedFile>,
    pub diagnostics: Vec<Diagnostic>,
    /// Moves actually performed (0 in test mode).
    pub count: usize,
    pub test_mode: bool,
    /// False when the plan was refused and nothing ran.
    pub executed: bool,
}

impl fmt::Display for RenameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.renamed {
            writeln!(f, "{} -> {}", file.source.display(), file.new_name)?;
        }
        if self.count > 0 {
            writeln!(f, "{} files renamed", self.count)?;
        }
        for diag in &self.diagnostics {
            writeln!(f, "{}: {}", diag.source.display(), diag.status)?;
        }
        Ok(())
    }
}

/// Result of replaying the most recent revert script.
#[derive(Debug, Serialize)]
pub struct RevertReport {
    pub restored: usize,
}

impl fmt::Display for RevertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reverted {} renames", self.restored)
    }
}
