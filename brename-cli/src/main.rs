use anyhow::Result;
use brename_core::{rename_operation, revert_operation, Config, RenameRequest};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable lines on stdout
    Summary,
    /// Machine-readable JSON report
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "brename",
    version,
    about = "Batch file renamer with macros, plugins, and revert scripts"
)]
struct Cli {
    /// First value of the %n sequence macro
    #[arg(short = 'i', long, default_value_t = 1)]
    start_index: u32,

    /// Treat the find pattern as a regular expression
    #[arg(short = 'e', long = "reg-ex")]
    reg_ex: bool,

    /// Match against the whole name, extension included
    #[arg(short = 'a', long)]
    include_ext: bool,

    /// Text or pattern to find in each name
    #[arg(short = 'f', long, default_value = "")]
    find: String,

    /// Replacement text; may contain macros
    #[arg(short = 'r', long, default_value = "")]
    replace: String,

    /// Show what would be renamed without touching anything
    #[arg(short = 't', long)]
    test_mode: bool,

    /// Record a revert script for this batch
    #[arg(short = 'R', long)]
    allow_revert: bool,

    /// Replay the most recent revert script and exit
    #[arg(long, conflicts_with = "find")]
    revert_last: bool,

    /// Override the revert script directory
    #[arg(long, value_name = "DIR")]
    revert_dir: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Summary)]
    output: OutputFormat,

    /// Files to rename (paths or URIs)
    #[arg(value_name = "FILE")]
    files: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(dir) = &cli.revert_dir {
        config.revert_dir = dir.clone();
    }

    if cli.revert_last {
        let report = revert_operation(&config)?;
        match cli.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Summary => print!("{report}"),
        }
        return Ok(true);
    }

    let request = RenameRequest {
        start_index: cli.start_index,
        use_regex: cli.reg_ex,
        include_ext: cli.include_ext,
        find: cli.find.clone(),
        replace: cli.replace.clone(),
        test_mode: cli.test_mode,
        allow_revert: cli.allow_revert,
        files: cli.files.clone(),
    };

    let report = rename_operation(&request, &config)?;
    match cli.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Summary => print!("{report}"),
    }

    Ok(report.executed)
}
