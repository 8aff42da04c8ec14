use crate::config::Config;
use crate::planner::{self, FileEntry, PlanOutcome, RenameCriteria};
use crate::plugin::{PluginCatalog, PluginRegistry};
use anyhow::Result;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

/// Outcome of staging plugin workers for the current replace pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preparation {
    /// Every referenced worker is ready; planning can run immediately.
    Ready,
    /// A slow worker is preparing in the background; planning will block
    /// on it when it is next needed.
    Deferred,
}

/// Holds the file list, plugin workers, and any in-flight preparation for
/// one rename interaction.
pub struct RenameSession {
    config: Config,
    entries: Vec<FileEntry>,
    registry: PluginRegistry,
    prep: Option<JoinHandle<PluginRegistry>>,
}

impl RenameSession {
    pub fn new(config: Config) -> Self {
        Self::with_catalog(config, PluginCatalog::builtin())
    }

    pub fn with_catalog(config: Config, catalog: PluginCatalog) -> Self {
        Self {
            config,
            entries: Vec::new(),
            registry: PluginRegistry::new(catalog),
            prep: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Add files to the session. Accepts plain paths or URIs with a scheme
    /// prefix; missing files and duplicates are silently dropped.
    pub fn add_files<I, S>(&mut self, files: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for file in files {
            let path = path_from_uri(file.as_ref());
            if !path.is_file() {
                continue;
            }
            if self.entries.iter().any(|e| e.source == path) {
                continue;
            }
            self.entries.push(FileEntry::new(path));
        }
    }

    fn files(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.source.clone()).collect()
    }

    /// Stage plugin workers for `replace`. When a slow worker has files to
    /// prepare and the caller is interactive, the work runs on a background
    /// thread so the UI stays responsive; `plan` joins it before expanding.
    pub fn prepare_plugins(&mut self, replace: &str, interactive: bool) -> Preparation {
        // A new pattern or file list always waits for the previous worker.
        self.finish_preparation();

        let files = self.files();
        let staging = self.registry.stage(replace, &files);
        if !staging.needs_prepare {
            return Preparation::Ready;
        }

        if staging.slow && interactive {
            let mut registry = std::mem::take(&mut self.registry);
            self.prep = Some(thread::spawn(move || {
                registry.prepare_pending();
                registry
            }));
            Preparation::Deferred
        } else {
            self.registry.prepare_pending();
            Preparation::Ready
        }
    }

    /// True while a background preparation is still running or unjoined.
    pub fn preparing(&self) -> bool {
        self.prep.is_some()
    }

    /// Wait for any background preparation and take its registry back.
    pub fn finish_preparation(&mut self) {
        if let Some(handle) = self.prep.take() {
            // A panicked worker leaves the fresh placeholder registry in
            // place, so its macros pass through unexpanded.
            if let Ok(registry) = handle.join() {
                self.registry = registry;
            }
        }
    }

    /// Compute statuses and a rename plan for the current file list.
    pub fn plan(&mut self, criteria: &RenameCriteria) -> Result<PlanOutcome> {
        self.finish_preparation();
        planner::plan_renames(&mut self.entries, criteria, Some(&self.registry))
    }
}

/// Strip a URI scheme prefix (`file://`, `sftp://`, ...) so drag-and-drop
/// input works the same as plain paths.
pub fn path_from_uri(uri: &str) -> PathBuf {
    match uri.find("://") {
        Some(pos) => PathBuf::from(&uri[pos + 3..]),
        None => PathBuf::from(uri),
    }
}
