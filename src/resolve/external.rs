//! Dependency classification.
//!
//! Decides, per build mode, whether an import specifier stays an external
//! reference instead of being compiled into the output.

use crate::build::BuildContext;

use super::manifest::PackageManifest;
use super::ResolveError;

/// Dependency names read from the entry package manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    pub dependencies: Vec<String>,
    pub peer_dependencies: Vec<String>,
    /// Scope prefix (e.g. `@vue`) whose packages are never bundled in module mode
    pub reserved_scope: String,
}

impl DependencySet {
    pub fn from_manifest(manifest: &PackageManifest, reserved_scope: impl Into<String>) -> Self {
        Self {
            dependencies: manifest.dependencies.keys().cloned().collect(),
            peer_dependencies: manifest.peer_dependencies.keys().cloned().collect(),
            reserved_scope: reserved_scope.into(),
        }
    }
}

/// Classifies import specifiers as external or inlinable.
#[derive(Debug, Clone)]
pub struct DependencyClassifier {
    deps: DependencySet,
}

impl DependencyClassifier {
    pub fn new(deps: DependencySet) -> Self {
        Self { deps }
    }

    /// Build a classifier from the entry package manifest of a context.
    pub fn from_context(ctx: &BuildContext) -> Result<Self, ResolveError> {
        let manifest = PackageManifest::load(&ctx.entry_manifest())?;
        let reserved = ctx.config().dependencies.reserved_scope.clone();
        Ok(Self::new(DependencySet::from_manifest(&manifest, reserved)))
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.deps
    }

    /// Whether `specifier` stays external.
    ///
    /// Peer dependencies are always external. Outside full mode, declared
    /// dependencies and the reserved scope are external too.
    pub fn is_external(&self, specifier: &str, full: bool) -> bool {
        if self.deps.peer_dependencies.iter().any(|name| matches_package(specifier, name)) {
            return true;
        }
        if full {
            return false;
        }
        self.deps.dependencies.iter().any(|name| matches_package(specifier, name))
            || (!self.deps.reserved_scope.is_empty()
                && matches_package(specifier, &self.deps.reserved_scope))
    }
}

/// `specifier` is `name` itself or a subpath of it.
pub fn matches_package(specifier: &str, name: &str) -> bool {
    specifier
        .strip_prefix(name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
