//! Import specifier resolution.
//!
//! Both bundlers consult the same two policies: the [`DependencyClassifier`]
//! keeps dependencies external and the [`AliasRewriter`] redirects the
//! style-source package to its published path. The [`SpecifierRewriter`]
//! applies the equivalent mapping to emitted declaration text.

pub mod alias;
pub mod external;
pub mod manifest;
pub mod node;
pub mod rewrite;

use std::path::PathBuf;

pub use alias::{AliasRewriter, ResolvedAlias};
pub use external::{matches_package, DependencyClassifier, DependencySet};
pub use manifest::PackageManifest;
pub use rewrite::SpecifierRewriter;

/// Error while resolving a specifier or reading a manifest.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot resolve '{specifier}' from {}", importer.display())]
    Unresolved { specifier: String, importer: PathBuf },
}
