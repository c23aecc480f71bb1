//! Kiln - build pipeline for multi-package component libraries
//!
//! This library provides functionality to:
//! - Compile a workspace of scripts and single-file components into
//!   tree-preserving ESM and CommonJS outputs
//! - Bundle the library and each locale into self-contained browser bundles
//! - Type-check the workspace and emit declaration files
//! - Merge translated resource trees, compile the style package and stamp
//!   release manifests

pub mod build;
pub mod cli;
pub mod compile;
pub mod config;
pub mod dts;
pub mod locale;
pub mod release;
pub mod resolve;
pub mod sfc;
pub mod syntax;
pub mod theme;
