//! Kiln - command-line build tool for multi-package component libraries

use std::process::ExitCode;

use kiln::cli;

fn main() -> ExitCode {
    cli::run()
}
