//! `package.json` manifests.
//!
//! Only the fields the build reads are typed; the raw document is kept so a
//! manifest can be rewritten without losing or reordering unknown keys.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::ResolveError;

/// Typed view of a package manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        let contents = fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ResolveError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Entry file of the package: `module`, then `main`, then `index.js`.
    pub fn entry_file(&self, package_dir: &Path) -> PathBuf {
        let entry = self
            .module
            .as_deref()
            .or(self.main.as_deref())
            .unwrap_or("index.js");
        package_dir.join(entry.trim_start_matches("./"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_fields() {
        let manifest = PackageManifest::parse(
            r#"{
                "name": "element-plus",
                "version": "2.0.0",
                "dependencies": { "dayjs": "^1.11.0", "@vueuse/core": "^9.0.0" },
                "peerDependencies": { "vue": "^3.2.0" },
                "scripts": { "build": "kiln build" }
            }"#,
        )
        .expect("should parse manifest");
        assert_eq!(manifest.name.as_deref(), Some("element-plus"));
        assert_eq!(manifest.dependencies.len(), 2);
        assert!(manifest.peer_dependencies.contains_key("vue"));
    }

    #[test]
    fn test_entry_file_precedence() {
        let dir = Path::new("/nm/pkg");
        let mut manifest = PackageManifest::default();
        assert_eq!(manifest.entry_file(dir), PathBuf::from("/nm/pkg/index.js"));
        manifest.main = Some("./lib/index.js".to_string());
        assert_eq!(manifest.entry_file(dir), PathBuf::from("/nm/pkg/lib/index.js"));
        manifest.module = Some("es/index.mjs".to_string());
        assert_eq!(manifest.entry_file(dir), PathBuf::from("/nm/pkg/es/index.mjs"));
    }
}
