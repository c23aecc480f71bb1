//! Source file discovery for the build system.
//!
//! Enumerates the workspace sources under the packages directory, applying
//! the configured extension set and exclude list, and maps every file to its
//! logical path.

use crate::build::BuildContext;
use glob::glob;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Error during source discovery.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    InvalidPattern(String, glob::PatternError),
    /// IO error during file enumeration
    Io(std::io::Error),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::InvalidPattern(pattern, err) => {
                write!(f, "Invalid glob pattern '{}': {}", pattern, err)
            }
            DiscoveryError::Io(err) => write!(f, "IO error during discovery: {}", err),
        }
    }
}

impl std::error::Error for DiscoveryError {}

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io(err)
    }
}

/// Kind of a source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// `.js`, `.ts`, `.jsx`, `.tsx`
    Script,
    /// `.vue` component description
    Component,
}

/// A source file of the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Path relative to the logical package root
    pub logical: PathBuf,
    pub kind: UnitKind,
}

impl SourceUnit {
    /// Create a unit for a file, or `None` if it lies outside the packages dir.
    pub fn new(ctx: &BuildContext, path: PathBuf) -> Option<Self> {
        let logical = ctx.logical_path(&path)?;
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("vue") => UnitKind::Component,
            _ => UnitKind::Script,
        };
        Some(Self { path, logical, kind })
    }

    pub fn extension(&self) -> &str {
        self.path.extension().and_then(|e| e.to_str()).unwrap_or("")
    }

    /// An ambient declaration file (`*.d.ts`).
    pub fn is_declaration_file(&self) -> bool {
        is_declaration_file(&self.path)
    }

    /// Logical path with forward slashes, used as the unit id.
    pub fn id(&self) -> String {
        slash_path(&self.logical)
    }
}

/// Render a relative path with `/` separators.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn is_declaration_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".d.ts") || n.ends_with(".d.mts") || n.ends_with(".d.cts"))
}

/// Discover files matching a glob pattern whose extension is in `extensions`.
///
/// # Returns
/// Sorted list of matching file paths.
pub fn discover_files(
    base_dir: &Path,
    pattern: &str,
    extensions: &[String],
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let full_pattern = base_dir.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let paths =
        glob(&pattern_str).map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() && has_extension(&path, extensions) {
                    files.push(path);
                }
            }
            Err(e) => {
                warn!("error reading path: {}", e);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x == ext))
}

/// Check whether a path (relative to the packages dir) is excluded.
///
/// A path is excluded when one of its directory segments, or one of the
/// dot-separated parts of its file name before the extension, equals an
/// entry of `exclude` (`button.test.ts`, `__tests__/a.ts`, `gulpfile.ts`).
pub fn is_excluded(relative: &Path, exclude: &[String]) -> bool {
    let matches = |part: &str| exclude.iter().any(|x| x == part);
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        let part = component.as_os_str().to_string_lossy();
        if components.peek().is_some() {
            if matches(&part) {
                return true;
            }
            continue;
        }
        let name = part.as_ref();
        let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
        if stem.split('.').any(matches) {
            return true;
        }
    }
    false
}

/// Discover every source unit under the packages dir with one of `extensions`.
pub fn discover_units(
    ctx: &BuildContext,
    extensions: &[String],
) -> Result<Vec<SourceUnit>, DiscoveryError> {
    let packages = ctx.packages_dir();
    let exclude = &ctx.config().modules.exclude;
    let mut units = Vec::new();
    for path in discover_files(&packages, "**/*", extensions)? {
        let Ok(relative) = path.strip_prefix(&packages) else {
            continue;
        };
        if is_excluded(relative, exclude) {
            continue;
        }
        if let Some(unit) = SourceUnit::new(ctx, path.clone()) {
            units.push(unit);
        }
    }
    Ok(units)
}

/// Units compiled by the module bundler; declaration files have no runtime.
pub fn discover_module_units(ctx: &BuildContext) -> Result<Vec<SourceUnit>, DiscoveryError> {
    let units = discover_units(ctx, &ctx.config().modules.extensions)?;
    Ok(units.into_iter().filter(|u| !u.is_declaration_file()).collect())
}

/// Units considered by the declaration pipeline, `.d.ts` files included.
pub fn discover_declaration_units(ctx: &BuildContext) -> Result<Vec<SourceUnit>, DiscoveryError> {
    discover_units(ctx, &ctx.config().types.extensions)
}

/// Top-level locale sources compiled to standalone bundles.
pub fn discover_locale_sources(ctx: &BuildContext) -> Result<Vec<PathBuf>, DiscoveryError> {
    let dir = ctx.locale_sources_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let extensions = ["ts".to_string(), "js".to_string()];
    let files = discover_files(&dir, "*", &extensions)?;
    Ok(files.into_iter().filter(|f| !is_declaration_file(f)).collect())
}
