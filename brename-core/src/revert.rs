//! Revert session store: reversible rename batches persisted as executable
//! shell scripts, plus a "latest" pointer to the most recently closed batch.

use crate::executor::move_file;
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the pointer script referencing the most recent revert batch.
pub const LATEST_SCRIPT: &str = "revert-rename.sh";

/// Records one batch of inverse moves. The script file is created lazily on
/// the first successful rename, so an aborted or empty batch leaves nothing
/// behind.
pub struct RevertLog {
    dir: PathBuf,
    script: Option<(PathBuf, File)>,
}

impl RevertLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            script: None,
        }
    }

    /// Append one inverse-move record: `renamed` back to `original`.
    /// Records are written in execution order, not reversed; the planner
    /// guarantees no chained targets within a batch, so forward replay is
    /// correct.
    pub fn record(&mut self, original: &Path, renamed: &Path) -> Result<()> {
        if self.script.is_none() {
            self.open_script()?;
        }
        let (_, file) = self.script.as_mut().expect("open revert script");
        let notice = format!(
            "'{}' → '{}'",
            renamed.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            original.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        );
        writeln!(file, "printf '%s\\n' {}", shell_quote(&notice))?;
        writeln!(
            file,
            "mv {} {}",
            shell_quote(&renamed.to_string_lossy()),
            shell_quote(&original.to_string_lossy())
        )?;
        Ok(())
    }

    fn open_script(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create revert directory {}", self.dir.display()))?;
        let name = format!(
            "revert-rename-{}.sh",
            Local::now().format("%Y-%m-%d-%H_%M_%S")
        );
        let path = self.dir.join(name);
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create revert script {}", path.display()))?;
        writeln!(file, "echo Reverting changes:")?;
        writeln!(file)?;
        self.script = Some((path, file));
        Ok(())
    }

    /// Close the batch: flush the script, mark it executable, and rewrite
    /// the "latest" pointer. Returns the script path, or `None` when no
    /// rename was recorded.
    pub fn close(&mut self) -> Result<Option<PathBuf>> {
        let Some((path, mut file)) = self.script.take() else {
            return Ok(None);
        };
        file.flush()?;
        drop(file);
        mark_executable(&path)?;

        let pointer = self.dir.join(LATEST_SCRIPT);
        fs::write(&pointer, format!("{}\n", path.display()))
            .with_context(|| format!("failed to write revert pointer {}", pointer.display()))?;
        mark_executable(&pointer)?;
        Ok(Some(path))
    }
}

/// Execute a revert script: replay its inverse-move records in the order
/// they were written, then delete the consumed script.
pub fn execute_script(path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("revert script {} does not exist", path.display()))?;
    let mut count = 0;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("mv ") {
            let (from, rest) = parse_quoted(rest)?;
            let (to, _) = parse_quoted(rest.trim_start())?;
            move_file(Path::new(&from), Path::new(&to))?;
            count += 1;
        }
    }
    fs::remove_file(path)
        .with_context(|| format!("failed to remove revert script {}", path.display()))?;
    Ok(count)
}

/// Resolve the "latest" pointer in `dir`, execute the referenced script, and
/// delete the pointer. Only one "latest" exists at a time.
pub fn execute_latest(dir: &Path) -> Result<usize> {
    let pointer = dir.join(LATEST_SCRIPT);
    if !pointer.exists() {
        return Err(anyhow!("{} doesn't exist", pointer.display()));
    }
    let content = fs::read_to_string(&pointer)?;
    let script = content
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("revert pointer {} is empty", pointer.display()))?;
    let count = execute_script(Path::new(script))?;
    fs::remove_file(&pointer)
        .with_context(|| format!("failed to remove revert pointer {}", pointer.display()))?;
    Ok(count)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o700);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

/// Parse one single-quoted argument, returning it and the rest of the line.
fn parse_quoted(input: &str) -> Result<(String, &str)> {
    let rest = input
        .strip_prefix('\'')
        .ok_or_else(|| anyhow!("malformed revert entry: {}", input))?;
    let mut out = String::new();
    let mut remaining = rest;
    loop {
        let idx = remaining
            .find('\'')
            .ok_or_else(|| anyhow!("unterminated path in revert entry"))?;
        out.push_str(&remaining[..idx]);
        let after = &remaining[idx + 1..];
        if let Some(continued) = after.strip_prefix("\\''") {
            out.push('\'');
            remaining = continued;
        } else {
            return Ok((out, after));
        }
    }
}
