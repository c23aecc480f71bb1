//! Release stamping of package manifests.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::build::BuildContext;

/// Environment variable holding the release version.
pub const VERSION_VAR: &str = "TAG_VERSION";
/// Environment variable holding the source revision.
pub const REVISION_VAR: &str = "GIT_HEAD";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError {
    #[error("${0} is not set; both $TAG_VERSION and $GIT_HEAD are required")]
    MissingVariable(&'static str),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest {} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },
}

/// Version and revision stamped into the manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub version: String,
    pub revision: String,
}

impl ReleaseInfo {
    pub fn new(version: impl Into<String>, revision: impl Into<String>) -> Self {
        Self { version: version.into(), revision: revision.into() }
    }

    /// Read both values from the process environment.
    pub fn from_env() -> Result<Self, ReleaseError> {
        let read = |name: &'static str| match env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(ReleaseError::MissingVariable(name)),
        };
        Ok(Self::new(read(VERSION_VAR)?, read(REVISION_VAR)?))
    }
}

/// Set `version` and `gitHead` in one manifest, keeping every other key
/// where it was.
pub fn stamp_manifest(path: &Path, release: &ReleaseInfo) -> Result<(), ReleaseError> {
    let io = |source| ReleaseError::Io { path: path.to_path_buf(), source };
    let text = fs::read_to_string(path).map_err(io)?;
    let mut manifest: Value = serde_json::from_str(&text)
        .map_err(|source| ReleaseError::Parse { path: path.to_path_buf(), source })?;
    let Some(fields) = manifest.as_object_mut() else {
        return Err(ReleaseError::NotAnObject { path: path.to_path_buf() });
    };
    fields.insert("version".to_string(), Value::String(release.version.clone()));
    fields.insert("gitHead".to_string(), Value::String(release.revision.clone()));

    let mut out = serde_json::to_string_pretty(&manifest)
        .map_err(|source| ReleaseError::Parse { path: path.to_path_buf(), source })?;
    out.push('\n');
    fs::write(path, out).map_err(io)
}

/// Manifests stamped for a release: the configured ones, or the entry
/// package manifest.
pub fn release_manifests(ctx: &BuildContext) -> Vec<PathBuf> {
    let configured = &ctx.config().release.manifests;
    if configured.is_empty() {
        vec![ctx.entry_manifest()]
    } else {
        configured.iter().map(|p| ctx.resolve_path(p)).collect()
    }
}

/// Stamp every release manifest of `ctx`.
pub fn stamp_release(ctx: &BuildContext, release: &ReleaseInfo) -> Result<Vec<PathBuf>, ReleaseError> {
    info!("stamping version {} ({})", release.version, release.revision);
    let manifests = release_manifests(ctx);
    for manifest in &manifests {
        stamp_manifest(manifest, release)?;
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_stamp_preserves_key_order() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = temp.path().join("package.json");
        fs::write(&path, "{\"name\":\"ui\",\"version\":\"0.0.0\",\"main\":\"lib/index.js\"}")
            .expect("should write");

        stamp_manifest(&path, &ReleaseInfo::new("2.1.0", "abc123")).expect("should stamp");

        let text = fs::read_to_string(&path).expect("should read");
        assert_eq!(
            text,
            "{\n  \"name\": \"ui\",\n  \"version\": \"2.1.0\",\n  \"main\": \"lib/index.js\",\n  \"gitHead\": \"abc123\"\n}\n"
        );
    }

    #[test]
    fn test_stamp_rejects_non_objects() {
        let temp = TempDir::new().expect("should create temp dir");
        let path = temp.path().join("package.json");
        fs::write(&path, "[]").expect("should write");
        let err = stamp_manifest(&path, &ReleaseInfo::new("1", "a")).expect_err("should fail");
        assert!(matches!(err, ReleaseError::NotAnObject { .. }));
    }

    #[test]
    #[serial]
    fn test_release_info_from_env() {
        env::set_var(VERSION_VAR, "3.0.0");
        env::set_var(REVISION_VAR, "deadbeef");
        let info = ReleaseInfo::from_env().expect("should read env");
        assert_eq!(info, ReleaseInfo::new("3.0.0", "deadbeef"));

        env::remove_var(REVISION_VAR);
        let err = ReleaseInfo::from_env().expect_err("should require revision");
        assert!(matches!(err, ReleaseError::MissingVariable(REVISION_VAR)));
        env::remove_var(VERSION_VAR);
    }
}
