//! Command-line interface implementation
//!
//! Parses arguments, installs logging and dispatches each subcommand to the
//! matching build task.

mod tasks;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::build::Task;

pub use tasks::{init_tracing, load_context};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
/// Reported by clap itself for invalid arguments
#[allow(dead_code)]
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// kiln - build a multi-package component library into a publishable package
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(about = "Build a multi-package component library into a publishable package")]
#[command(version)]
pub struct Cli {
    /// Path to kiln.toml (default: searched upward from the project root)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root (default: directory of kiln.toml, else the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Override the output directory
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full release build: clean, bundles, types, theme, copies
    Build,

    /// Tree-preserving ESM and CommonJS outputs
    Modules,

    /// Self-contained browser bundles and locale bundles
    Full {
        /// Base name of the bundle files (default: index.full)
        #[arg(long)]
        entry_name: Option<String>,
    },

    /// Type-check and emit declaration files
    Types,

    /// Merge the translated resource trees
    Locale,

    /// Compile the style package
    Theme,

    /// Copy build products into the package output
    Copy {
        /// What to copy
        #[arg(value_enum, default_value = "all")]
        what: CopyTarget,
    },

    /// Stamp $TAG_VERSION and $GIT_HEAD into the release manifests
    Stamp,

    /// Remove the output directory
    Clean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CopyTarget {
    /// Declaration tree into es/ and lib/
    Types,
    /// Package manifest and extra files
    Files,
    /// Full stylesheet next to the browser bundles
    FullStyle,
    All,
}

impl CopyTarget {
    fn tasks(self) -> Vec<Task> {
        match self {
            CopyTarget::Types => vec![Task::CopyTypes],
            CopyTarget::Files => vec![Task::CopyFiles],
            CopyTarget::FullStyle => vec![Task::CopyFullStyle],
            CopyTarget::All => vec![Task::CopyTypes, Task::CopyFiles, Task::CopyFullStyle],
        }
    }
}

impl Commands {
    /// Tasks run for the command; `None` for the default composition.
    pub fn tasks(&self) -> Option<Vec<Task>> {
        let tasks = match self {
            Commands::Build => return None,
            Commands::Modules => vec![Task::Modules],
            Commands::Full { .. } => vec![Task::FullBundle],
            Commands::Types => vec![Task::Types],
            Commands::Locale => vec![Task::Locale],
            Commands::Theme => vec![Task::Theme],
            Commands::Copy { what } => what.tasks(),
            Commands::Stamp => vec![Task::Stamp],
            Commands::Clean => vec![Task::Clean],
        };
        Some(tasks)
    }
}

/// Entry point of the `kiln` binary.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tasks::run_command(&cli)
}
