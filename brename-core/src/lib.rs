#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod executor;
pub mod expr;
pub mod macros;
pub mod operations;
pub mod output;
pub mod planner;
pub mod plugin;
pub mod revert;
pub mod session;

pub use config::Config;
pub use executor::{execute_plan, ExecuteOptions, ExecuteReport};
pub use macros::{expand, has_macro, MacroContext, MacroError};
pub use operations::{rename_operation, revert_operation, RenameRequest};
pub use output::{Diagnostic, RenameReport, RenamedFile, RevertReport};
pub use planner::{
    plan_renames, FileEntry, PlanOutcome, RenameCriteria, RenamePlan, Status,
};
pub use plugin::{PluginCatalog, PluginError, PluginRegistry, PluginWorker};
pub use revert::{execute_latest, execute_script, RevertLog};
pub use session::{Preparation, RenameSession};
