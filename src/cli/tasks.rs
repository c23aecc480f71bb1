//! Context loading and task dispatch for the CLI.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use super::{Cli, Commands, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, Pipeline};
use crate::config::loader::{find_config_from, load_config_file, merge_cli_overrides, CliOverrides};
use crate::config::{ConfigError, KilnConfig};

/// Install the stderr subscriber. `RUST_LOG` applies unless `-v` asks for
/// debug output.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the configuration and build the context for a command.
pub fn load_context(cli: &Cli) -> Result<BuildContext, ConfigError> {
    let start = match &cli.root {
        Some(root) => root.clone(),
        None => env::current_dir()?,
    };
    let config_path = cli.config.clone().or_else(|| find_config_from(start.clone()));

    let mut config = match &config_path {
        Some(path) => {
            debug!("using config {}", path.display());
            load_config_file(path)?
        }
        None => {
            debug!("no kiln.toml found, using defaults");
            KilnConfig::default()
        }
    };

    let entry_name = match &cli.command {
        Commands::Full { entry_name } => entry_name.clone(),
        _ => None,
    };
    merge_cli_overrides(&mut config, &CliOverrides { output: cli.output.clone(), entry_name });

    let root: PathBuf = match (&cli.root, &config_path) {
        (Some(root), _) => root.clone(),
        (None, Some(path)) => path.parent().map(PathBuf::from).unwrap_or(start),
        (None, None) => start,
    };
    Ok(BuildContext::new(config, root).with_verbose(cli.verbose))
}

pub(super) fn run_command(cli: &Cli) -> ExitCode {
    let context = match load_context(cli) {
        Ok(context) => context,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let pipeline = Pipeline::new(context);
    let result = match cli.command.tasks() {
        Some(tasks) => pipeline.run(&tasks),
        None => pipeline.build(),
    };

    println!("{}", result.summary());
    if result.is_success() {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_context_uses_config_dir_as_root() {
        let temp = TempDir::new().expect("should create temp dir");
        fs::write(
            temp.path().join("kiln.toml"),
            "[naming]\nscope = \"@ui\"\npackage = \"ui-kit\"\n",
        )
        .expect("should write config");
        let config = temp.path().join("kiln.toml");
        let cli = Cli::try_parse_from([
            "kiln",
            "full",
            "--entry-name",
            "index.full",
            "--config",
            config.to_str().expect("should be utf-8"),
        ])
        .expect("should parse");

        let ctx = load_context(&cli).expect("should load");
        assert_eq!(ctx.project_root(), temp.path());
        assert_eq!(ctx.package_name(), "ui-kit");
        assert_eq!(ctx.config().bundle.entry_name.as_deref(), Some("index.full"));
    }

    #[test]
    fn test_load_context_defaults_without_config() {
        let temp = TempDir::new().expect("should create temp dir");
        let root = temp.path().to_str().expect("should be utf-8");
        let cli = Cli::try_parse_from(["kiln", "modules", "--root", root, "--output", "out"])
            .expect("should parse");

        let ctx = load_context(&cli).expect("should load");
        assert_eq!(ctx.project_root(), temp.path());
        assert_eq!(ctx.output_dir(), temp.path().join("out"));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp = TempDir::new().expect("should create temp dir");
        fs::write(temp.path().join("kiln.toml"), "[naming]\nscope = \"ui\"\n").expect("should write");
        let root = temp.path().to_str().expect("should be utf-8");
        let cli = Cli::try_parse_from(["kiln", "types", "--root", root]).expect("should parse");
        assert!(matches!(load_context(&cli), Err(ConfigError::Validation(_))));
    }
}
