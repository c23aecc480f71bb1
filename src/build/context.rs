//! Build context containing configuration and derived paths for a build.

use crate::config::KilnConfig;
use std::path::{Component, Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// Every build constant (package name, scope, namespaces, directory layout)
/// is read through this one immutable value, so tasks running in parallel
/// share it by reference.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: KilnConfig,
    /// Project root directory (where kiln.toml is located)
    project_root: PathBuf,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: KilnConfig, project_root: PathBuf) -> Self {
        Self {
            config,
            project_root,
            verbose: false,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &KilnConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve a path relative to the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Directory holding every workspace package.
    pub fn packages_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.packages)
    }

    /// Directory of the entry package.
    pub fn entry_dir(&self) -> PathBuf {
        self.packages_dir().join(&self.config.project.entry)
    }

    /// Build output root.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.output)
    }

    /// Output root of the published package.
    pub fn package_output(&self) -> PathBuf {
        self.output_dir().join(&self.config.naming.package)
    }

    /// Directory of the self-contained bundles.
    pub fn dist_dir(&self) -> PathBuf {
        self.package_output().join("dist")
    }

    /// Declaration output directory.
    pub fn types_dir(&self) -> PathBuf {
        self.output_dir().join(&self.config.types.out)
    }

    /// Locale sources compiled into mini-bundles.
    pub fn locale_sources_dir(&self) -> PathBuf {
        self.packages_dir().join(&self.config.bundle.locale_dir)
    }

    /// Stylesheet sources.
    pub fn style_source_dir(&self) -> PathBuf {
        match &self.config.theme.source {
            Some(source) => self.resolve_path(source),
            None => self.packages_dir().join(&self.config.naming.style_package).join("src"),
        }
    }

    /// Compiled stylesheet output.
    pub fn style_output_dir(&self) -> PathBuf {
        self.package_output().join(&self.config.naming.style_package)
    }

    /// Manifest of the entry package.
    pub fn entry_manifest(&self) -> PathBuf {
        match &self.config.dependencies.manifest {
            Some(manifest) => self.resolve_path(manifest),
            None => self.entry_dir().join("package.json"),
        }
    }

    /// Internal workspace scope, e.g. `@element-plus`.
    pub fn scope(&self) -> &str {
        &self.config.naming.scope
    }

    /// Published package name, e.g. `element-plus`.
    pub fn package_name(&self) -> &str {
        &self.config.naming.package
    }

    /// Specifier of the internal style-source package (`<scope>/<style>`).
    pub fn style_source_specifier(&self) -> String {
        format!("{}/{}", self.config.naming.scope, self.config.naming.style_package)
    }

    /// Published style subpath (`<package>/<style>`).
    pub fn style_public_specifier(&self) -> String {
        format!("{}/{}", self.config.naming.package, self.config.naming.style_package)
    }

    /// Published root of the ESM tree (`<package>/es`).
    pub fn public_module_root(&self) -> String {
        format!("{}/es", self.config.naming.package)
    }

    /// Map a source file to its logical path.
    ///
    /// Files of the entry package are hoisted to the logical root, files of
    /// every other package keep their path relative to the packages directory.
    /// Returns `None` for files outside the packages directory.
    pub fn logical_path(&self, source: &Path) -> Option<PathBuf> {
        let relative = source.strip_prefix(self.packages_dir()).ok()?;
        let mut components = relative.components();
        match components.next() {
            Some(Component::Normal(first)) if first == self.config.project.entry.as_str() => {
                let rest = components.as_path();
                (!rest.as_os_str().is_empty()).then(|| rest.to_path_buf())
            }
            Some(Component::Normal(_)) => Some(relative.to_path_buf()),
            _ => None,
        }
    }

    /// Map an internal-scope specifier (`<scope>/<rest>`) to a path under
    /// the packages directory.
    pub fn scope_path(&self, specifier: &str) -> Option<PathBuf> {
        let rest = specifier.strip_prefix(self.scope())?.strip_prefix('/')?;
        if rest.is_empty() {
            return None;
        }
        Some(self.packages_dir().join(rest))
    }
}
