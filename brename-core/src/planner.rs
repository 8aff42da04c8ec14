//! Derives target names for a file set and classifies every entry.

use crate::macros::{self, MacroContext};
use crate::plugin::PluginRegistry;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use regex::bytes::RegexBuilder;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Classification of one entry after a planning pass. Exactly one status per
/// entry per pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Renamed,
    NotChanged,
    /// The derived name is blank.
    Empty,
    /// The target already exists on disk, or is another entry's source path.
    AlreadyExists,
    /// The target collides with an earlier entry's target; the index points
    /// at the entry that won the slot.
    ConflictsWith(usize),
    /// Macro expansion raised an error for this entry.
    Failed(String),
}

impl Status {
    /// Human-readable description, resolving conflict indices against the
    /// file set.
    pub fn describe(&self, entries: &[FileEntry]) -> String {
        match self {
            Self::Renamed => "Renamed".to_string(),
            Self::NotChanged => "Not changed".to_string(),
            Self::Empty => "Empty".to_string(),
            Self::AlreadyExists => "Already exists".to_string(),
            Self::ConflictsWith(index) => format!(
                "Conflicts with file: {}",
                entries.get(*index).map_or("?", |e| e.base_name.as_str())
            ),
            Self::Failed(message) => message.clone(),
        }
    }
}

/// One file of the working set. Created when a source path is added;
/// `computed_name` and `status` are recomputed on every planning pass.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub source: PathBuf,
    pub directory: PathBuf,
    pub base_name: String,
    pub computed_name: String,
    pub status: Status,
}

impl FileEntry {
    pub fn new(source: PathBuf) -> Self {
        let directory = source.parent().map(Path::to_path_buf).unwrap_or_default();
        let base_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source,
            directory,
            computed_name: base_name.clone(),
            base_name,
            status: Status::NotChanged,
        }
    }
}

/// The find/replace rule driving one planning pass.
#[derive(Debug, Clone, Default)]
pub struct RenameCriteria {
    pub start_index: u32,
    pub use_regex: bool,
    /// Match against the whole name instead of the stem, with no separate
    /// extension.
    pub include_ext: bool,
    pub find: String,
    pub replace: String,
}

/// Ordered `(source, target)` pairs for the `Renamed` subset, in file-set
/// order.
#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    pub moves: Vec<(PathBuf, PathBuf)>,
}

impl RenamePlan {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: RenamePlan,
    /// A pass is valid for execution iff at least one entry is `Renamed` and
    /// none are `AlreadyExists` or `ConflictsWith`.
    pub valid: bool,
}

/// Run one planning pass over `entries` in stable file-set order.
///
/// An invalid find regex is an input error for the whole pass. Per-entry
/// macro failures degrade that single entry to `Failed` and do not consume a
/// sequence slot.
pub fn plan_renames(
    entries: &mut [FileEntry],
    criteria: &RenameCriteria,
    plugins: Option<&PluginRegistry>,
) -> Result<PlanOutcome> {
    for entry in entries.iter_mut() {
        entry.computed_name = entry.base_name.clone();
        entry.status = Status::NotChanged;
    }

    if criteria.find.is_empty() && criteria.replace.is_empty() {
        return Ok(PlanOutcome {
            plan: RenamePlan::default(),
            valid: false,
        });
    }

    let regex = if criteria.use_regex {
        let pattern = if criteria.find.is_empty() {
            "^(.*)$"
        } else {
            criteria.find.as_str()
        };
        Some(
            RegexBuilder::new(pattern)
                .unicode(false)
                .build()
                .with_context(|| format!("invalid find pattern '{}'", pattern))?,
        )
    } else {
        None
    };

    // Every source path in the batch. A candidate target equal to any other
    // entry's source is refused even if that source would be vacated later in
    // the same batch, so the revert script can be replayed in forward order.
    let sources: HashSet<PathBuf> = entries.iter().map(|e| e.source.clone()).collect();
    let mut claimed: HashMap<PathBuf, usize> = HashMap::new();
    let mut moves = Vec::new();
    let mut seq = criteria.start_index;

    for index in 0..entries.len() {
        let (stem, ext) = if criteria.include_ext {
            (entries[index].base_name.clone(), String::new())
        } else {
            let (stem, ext) = macros::split_base(&entries[index].base_name);
            (stem.to_string(), ext.to_string())
        };

        let (new_text, groups) = match &regex {
            Some(re) => {
                let replaced = re.replace_all(stem.as_bytes(), criteria.replace.as_bytes());
                let groups = match re.captures(stem.as_bytes()) {
                    Some(caps) => caps
                        .iter()
                        .map(|g| {
                            g.map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                                .unwrap_or_default()
                        })
                        .collect(),
                    None => vec![criteria.find.clone()],
                };
                (String::from_utf8_lossy(&replaced).into_owned(), groups)
            },
            None => {
                let find_text = if criteria.find.is_empty() {
                    stem.clone()
                } else {
                    criteria.find.clone()
                };
                (stem.replace(&find_text, &criteria.replace), vec![find_text])
            },
        };

        let new_text = if !new_text.is_empty() && macros::has_macro(&new_text) {
            match expand_entry(&new_text, &entries[index].source, &groups, seq, plugins) {
                Ok(expanded) => {
                    seq += 1;
                    expanded
                },
                Err(message) => {
                    entries[index].status = Status::Failed(message);
                    continue;
                },
            }
        } else {
            new_text
        };

        let new_base = if criteria.include_ext {
            new_text.clone()
        } else {
            format!("{}{}", new_text, ext)
        };
        entries[index].computed_name = new_base.clone();

        if new_base == entries[index].base_name {
            continue;
        }
        if new_text.is_empty() {
            entries[index].status = Status::Empty;
            continue;
        }

        let target = entries[index].directory.join(&new_base);
        if target != entries[index].source && (target.exists() || sources.contains(&target)) {
            entries[index].status = Status::AlreadyExists;
            continue;
        }
        if let Some(&winner) = claimed.get(&target) {
            entries[index].status = Status::ConflictsWith(winner);
            continue;
        }
        claimed.insert(target.clone(), index);
        moves.push((entries[index].source.clone(), target));
        entries[index].status = Status::Renamed;
    }

    let conflicted = entries
        .iter()
        .any(|e| matches!(e.status, Status::AlreadyExists | Status::ConflictsWith(_)));
    let plan = RenamePlan { moves };
    let valid = !plan.is_empty() && !conflicted;
    Ok(PlanOutcome { plan, valid })
}

fn expand_entry(
    text: &str,
    source: &Path,
    groups: &[String],
    seq: u32,
    plugins: Option<&PluginRegistry>,
) -> Result<String, String> {
    let modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| e.to_string())?;
    let ctx = MacroContext {
        start_index: seq,
        path: source,
        groups,
        modified: DateTime::<Local>::from(modified),
        plugins,
    };
    macros::expand(text, &ctx).map_err(|e| e.to_string())
}
