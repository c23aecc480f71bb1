//! Build orchestration for a multi-package component library.
//!
//! Turns the workspace sources into publishable artifacts.
//!
//! # Overview
//!
//! The build consists of named tasks:
//! - **Modules**: tree-preserving ESM (`es/`) and CommonJS (`lib/`) outputs
//! - **Full bundle**: self-contained UMD and ESM browser bundles, plus one
//!   mini-bundle per locale
//! - **Types**: declaration files for every public unit
//! - **Theme** and **copy** tasks that assemble the published package
//!
//! # Example
//!
//! ```ignore
//! use kiln::build::{BuildContext, Pipeline};
//! use kiln::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let result = Pipeline::new(context).build();
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod emit;
pub mod full_bundle;
pub mod modules;
pub mod pipeline;
pub mod result;
pub mod target;

use std::path::PathBuf;

use thiserror::Error;

pub use context::*;
pub use discovery::*;
pub use emit::{EmittedFile, WriteError};
pub use full_bundle::FullBundleBuilder;
pub use modules::ModuleBundler;
pub use pipeline::*;
pub use result::*;
pub use target::*;

use crate::compile::CompileError;
use crate::config::ConfigError;
use crate::dts::DeclarationError;
use crate::locale::LocaleError;
use crate::release::ReleaseError;
use crate::resolve::ResolveError;
use crate::theme::ThemeError;

/// Error raised by either bundler. Any of them aborts the whole batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BundleError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("{} imports {}, which is not a script module", importer.display(), path.display())]
    NotScript { path: PathBuf, importer: PathBuf },
}

/// Error of any named task.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    #[error(transparent)]
    Locale(#[from] LocaleError),

    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Write(#[from] WriteError),
}
