//! Plugin registry for `%!{name:body}` macros.
//!
//! Plugins are resolved from a typed catalog (name -> factory) instead of
//! runtime module loading. A worker that cannot be constructed is treated as
//! absent and its macros pass through verbatim.

use chrono::{DateTime, Local};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static MACRO_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%!\{(\w+):[^}]*\}").expect("plugin macro pattern"));

#[derive(Debug, Error)]
pub enum PluginError {
    /// The worker has no usable cache entry for the file, either because
    /// `prepare` was never called or because the file could not be processed.
    #[error("file not prepared")]
    NotPrepared,
    #[error("{0}")]
    Eval(String),
}

/// Capability contract every plugin worker must satisfy.
pub trait PluginWorker: Send {
    /// File extensions the worker acts on, with leading dot. Empty = all files.
    fn extensions(&self) -> &[&str];

    /// Whether `prepare` performs blocking or expensive I/O.
    fn is_slow(&self) -> bool;

    /// Populate the internal cache for `files`. Called incrementally with
    /// only the newly added files of a session. Files the worker cannot
    /// process must be left without a cache entry, not reported as errors.
    fn prepare(&mut self, files: &[PathBuf]);

    /// Expand `body` (with embedded `%key%` placeholders) for `path`.
    fn eval_expr(
        &self,
        body: &str,
        path: &Path,
        groups: &[String],
    ) -> Result<String, PluginError>;
}

pub type WorkerFactory = Box<dyn Fn() -> Box<dyn PluginWorker> + Send + Sync>;

/// Typed plugin namespace: resolves macro name tokens to worker factories.
pub struct PluginCatalog {
    factories: HashMap<String, WorkerFactory>,
}

impl PluginCatalog {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The catalog shipped with the engine.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register("stat", || Box::<StatWorker>::default());
        catalog
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn PluginWorker> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    fn instantiate(&self, name: &str) -> Option<Box<dyn PluginWorker>> {
        self.factories.get(name).map(|factory| factory())
    }
}

/// One named plugin referenced by the current replace template. Lives for
/// the whole engine session.
struct PluginHandle {
    worker: Option<Box<dyn PluginWorker>>,
    pending: Vec<PathBuf>,
    slow: bool,
}

impl PluginHandle {
    fn filter_by_extension(&self, files: &[PathBuf]) -> Vec<PathBuf> {
        let Some(worker) = &self.worker else {
            return Vec::new();
        };
        let extensions = worker.extensions();
        if extensions.is_empty() {
            return files.to_vec();
        }
        files
            .iter()
            .filter(|f| {
                f.extension()
                    .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                    .is_some_and(|ext| extensions.contains(&ext.as_str()))
            })
            .cloned()
            .collect()
    }
}

/// Outcome of staging a planning pass against the registry.
#[derive(Debug, Clone, Copy)]
pub struct Staging {
    /// Whether any worker has files left to prepare.
    pub needs_prepare: bool,
    /// Whether any referenced worker with pending files declares itself slow.
    pub slow: bool,
}

/// Discovers, filters, and prepares the plugin workers referenced by the
/// replace template.
pub struct PluginRegistry {
    catalog: PluginCatalog,
    handles: HashMap<String, PluginHandle>,
    staged_files: usize,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new(PluginCatalog::builtin())
    }
}

impl PluginRegistry {
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            catalog,
            handles: HashMap::new(),
            staged_files: 0,
        }
    }

    /// Distinct plugin names referenced by `%!{name:...}` macros in `replace`.
    pub fn scan_names(replace: &str) -> BTreeSet<String> {
        MACRO_NAME_RE
            .captures_iter(replace)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Instantiate or reuse handles for every referenced plugin and queue the
    /// session files each worker still has to prepare.
    pub fn stage(&mut self, replace: &str, files: &[PathBuf]) -> Staging {
        let names = Self::scan_names(replace);
        if names.is_empty() {
            return Staging {
                needs_prepare: false,
                slow: false,
            };
        }

        let known: BTreeSet<String> = self.handles.keys().cloned().collect();
        let new_files = &files[self.staged_files.min(files.len())..];
        if known == names && new_files.is_empty() {
            return Staging {
                needs_prepare: false,
                slow: false,
            };
        }

        let mut slow = false;
        for name in &names {
            if !self.handles.contains_key(name) {
                let mut handle = PluginHandle {
                    worker: self.catalog.instantiate(name),
                    pending: Vec::new(),
                    slow: false,
                };
                handle.pending = handle.filter_by_extension(files);
                self.handles.insert(name.clone(), handle);
            } else {
                let handle = self.handles.get_mut(name).expect("existing handle");
                let additions = handle.filter_by_extension(new_files);
                handle.pending.extend(additions);
            }
            let handle = self.handles.get_mut(name).expect("staged handle");
            if !handle.pending.is_empty() {
                if let Some(worker) = &handle.worker {
                    handle.slow = handle.slow || worker.is_slow();
                }
            }
            slow = slow || handle.slow;
        }
        self.staged_files = files.len();

        Staging {
            needs_prepare: true,
            slow,
        }
    }

    /// Run `prepare` on every worker that has pending files.
    pub fn prepare_pending(&mut self) {
        for handle in self.handles.values_mut() {
            if let Some(worker) = &mut handle.worker {
                if !handle.pending.is_empty() {
                    let files = std::mem::take(&mut handle.pending);
                    worker.prepare(&files);
                }
            }
        }
    }

    /// Expand a plugin macro body. Unknown plugins, absent workers, and
    /// unprepared files leave the body verbatim; only genuine evaluation
    /// errors surface.
    pub fn eval(
        &self,
        name: &str,
        body: &str,
        path: &Path,
        groups: &[String],
    ) -> Result<String, PluginError> {
        match self.handles.get(name).and_then(|h| h.worker.as_ref()) {
            None => Ok(body.to_string()),
            Some(worker) => match worker.eval_expr(body, path, groups) {
                Err(PluginError::NotPrepared) => Ok(body.to_string()),
                other => other,
            },
        }
    }
}

/// Built-in plugin exposing file metadata: `%size%` (bytes) and `%mtime%`
/// (modification date, `YYYY-MM-DD`).
#[derive(Default)]
struct StatWorker {
    cache: HashMap<PathBuf, StatInfo>,
}

struct StatInfo {
    size: u64,
    mtime: String,
}

impl PluginWorker for StatWorker {
    fn extensions(&self) -> &[&str] {
        &[]
    }

    fn is_slow(&self) -> bool {
        false
    }

    fn prepare(&mut self, files: &[PathBuf]) {
        for file in files {
            let Ok(meta) = fs::metadata(file) else {
                continue;
            };
            let Ok(modified) = meta.modified() else {
                continue;
            };
            let mtime = DateTime::<Local>::from(modified)
                .format("%Y-%m-%d")
                .to_string();
            self.cache.insert(
                file.clone(),
                StatInfo {
                    size: meta.len(),
                    mtime,
                },
            );
        }
    }

    fn eval_expr(
        &self,
        body: &str,
        path: &Path,
        _groups: &[String],
    ) -> Result<String, PluginError> {
        let info = self.cache.get(path).ok_or(PluginError::NotPrepared)?;
        Ok(body
            .replace("%size%", &info.size.to_string())
            .replace("%mtime%", &info.mtime))
    }
}
