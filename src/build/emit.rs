//! Buffered output files.
//!
//! Tasks compute every output in memory and only write once the whole batch
//! has succeeded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;

/// A file to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub contents: String,
}

impl EmittedFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self { path: path.into(), contents: contents.into() }
    }
}

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl WriteError {
    pub fn new(path: &Path, source: io::Error) -> Self {
        Self { path: path.to_path_buf(), source }
    }
}

/// Write every file, creating parent directories. Returns the written paths
/// in input order.
pub fn write_outputs(files: &[EmittedFile]) -> Result<Vec<PathBuf>, WriteError> {
    files
        .par_iter()
        .map(|file| {
            if let Some(parent) = file.path.parent() {
                fs::create_dir_all(parent).map_err(|e| WriteError::new(parent, e))?;
            }
            fs::write(&file.path, &file.contents).map_err(|e| WriteError::new(&file.path, e))?;
            Ok(file.path.clone())
        })
        .collect()
}

/// Copy a file, creating the destination's parent directories.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), WriteError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| WriteError::new(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| WriteError::new(from, e))?;
    Ok(())
}

/// Copy every file under `from` to the same relative path under `to`.
pub fn copy_tree(from: &Path, to: &Path) -> Result<Vec<PathBuf>, WriteError> {
    let mut copied = Vec::new();
    let mut pending = vec![from.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| WriteError::new(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| WriteError::new(&dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(relative) = path.strip_prefix(from) else {
                continue;
            };
            let target = to.join(relative);
            copy_file(&path, &target)?;
            copied.push(target);
        }
    }
    copied.sort();
    Ok(copied)
}
