//! File probing and `node_modules` lookup.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::manifest::PackageManifest;

/// Extensions probed, in order, when a specifier omits one.
pub const PROBE_EXTENSIONS: &[&str] = &["mjs", "js", "json", "ts", "tsx", "vue"];

/// Script extensions that compile to modules.
pub const SCRIPT_EXTENSIONS: &[&str] = &["mjs", "cjs", "js", "jsx", "ts", "tsx", "vue", "json"];

pub fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// A package specifier (not relative, not absolute, not a URL).
pub fn is_bare(specifier: &str) -> bool {
    !is_relative(specifier) && !specifier.starts_with('/') && !specifier.contains(':')
}

/// Split a bare specifier into package name and subpath.
///
/// `@scope/pkg/a/b` -> (`@scope/pkg`, `a/b`), `pkg` -> (`pkg`, ``).
pub fn split_package(specifier: &str) -> (&str, &str) {
    let segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut end = 0;
    for _ in 0..segments {
        match specifier[end..].find('/') {
            Some(slash) => end += slash + 1,
            None => return (specifier, ""),
        }
    }
    (&specifier[..end - 1], &specifier[end..])
}

/// Whether a path names a file that compiles to a module.
pub fn is_script_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

/// Resolve `base` to an existing file: as is, with a probed extension, or as
/// a directory index.
pub fn probe(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    for ext in PROBE_EXTENSIONS {
        let mut name = base.as_os_str().to_os_string();
        name.push(".");
        name.push(ext);
        let candidate = PathBuf::from(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if base.is_dir() {
        for ext in PROBE_EXTENSIONS {
            let candidate = base.join(format!("index.{}", ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Resolve a relative specifier against the importing file's directory.
pub fn resolve_relative(importer_dir: &Path, specifier: &str) -> Option<PathBuf> {
    probe(&normalize(&importer_dir.join(specifier)))
}

/// Find the directory of an installed package, walking up from `from_dir`.
pub fn find_package_dir(from_dir: &Path, name: &str) -> Option<PathBuf> {
    from_dir
        .ancestors()
        .map(|dir| dir.join("node_modules").join(name))
        .find(|candidate| candidate.is_dir())
}

/// Resolve a bare specifier through `node_modules`.
///
/// A subpath is probed inside the package directory; the package itself
/// resolves to its manifest entry (`module`, then `main`, then `index.js`).
pub fn resolve_node_module(from_dir: &Path, specifier: &str) -> Option<PathBuf> {
    if !is_bare(specifier) {
        return None;
    }
    let (name, subpath) = split_package(specifier);
    let package_dir = find_package_dir(from_dir, name)?;
    if !subpath.is_empty() {
        return probe(&package_dir.join(subpath));
    }
    let manifest_path = package_dir.join("package.json");
    let manifest = if manifest_path.is_file() {
        PackageManifest::load(&manifest_path).unwrap_or_else(|e| {
            debug!("ignoring unreadable manifest {}: {}", manifest_path.display(), e);
            PackageManifest::default()
        })
    } else {
        PackageManifest::default()
    };
    probe(&manifest.entry_file(&package_dir)).or_else(|| probe(&package_dir.join("index.js")))
}

/// Lexically normalize `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Relative path from directory `from` to `to`, both absolute and normalized.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<_> = from.components().collect();
    let to_components: Vec<_> = to.components().collect();
    let common = from.iter().zip(&to_components).take_while(|(a, b)| a == b).count();
    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to_components[common..] {
        out.push(component.as_os_str());
    }
    out
}

/// Render a relative path as an import specifier (`./x`, `../x`).
pub fn to_specifier(relative: &Path) -> String {
    let text = crate::build::discovery::slash_path(relative);
    if text.starts_with("../") || text == ".." {
        text
    } else {
        format!("./{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("should have parent")).expect("should mkdir");
        fs::write(path, contents).expect("should write file");
    }

    #[test]
    fn test_split_package() {
        assert_eq!(split_package("vue"), ("vue", ""));
        assert_eq!(split_package("dayjs/plugin/utc"), ("dayjs", "plugin/utc"));
        assert_eq!(split_package("@vue/shared"), ("@vue/shared", ""));
        assert_eq!(split_package("@vue/shared/dist/x.js"), ("@vue/shared", "dist/x.js"));
        assert_eq!(split_package("@scope"), ("@scope", ""));
    }

    #[test]
    fn test_specifier_kinds() {
        assert!(is_relative("./a"));
        assert!(is_relative("../a"));
        assert!(!is_relative("a"));
        assert!(is_bare("lodash-unified"));
        assert!(!is_bare("/abs/path"));
        assert!(!is_bare("node:fs"));
    }

    #[test]
    fn test_probe_order() {
        let temp = TempDir::new().expect("should create temp dir");
        touch(temp.path(), "a.ts", "");
        touch(temp.path(), "a/index.ts", "");
        touch(temp.path(), "b/index.vue", "");
        touch(temp.path(), "c.vue", "");

        assert_eq!(probe(&temp.path().join("a")), Some(temp.path().join("a.ts")));
        assert_eq!(probe(&temp.path().join("b")), Some(temp.path().join("b/index.vue")));
        assert_eq!(probe(&temp.path().join("c.vue")), Some(temp.path().join("c.vue")));
        assert_eq!(probe(&temp.path().join("missing")), None);
    }

    #[test]
    fn test_resolve_node_module_entry_fields() {
        let temp = TempDir::new().expect("should create temp dir");
        touch(temp.path(), "node_modules/dayjs/package.json", r#"{"main": "dayjs.min.js"}"#);
        touch(temp.path(), "node_modules/dayjs/dayjs.min.js", "");
        touch(temp.path(), "node_modules/dayjs/plugin/utc.js", "");
        touch(temp.path(), "node_modules/plain/index.js", "");
        let nested = temp.path().join("packages/utils");
        fs::create_dir_all(&nested).expect("should mkdir");

        assert_eq!(
            resolve_node_module(&nested, "dayjs"),
            Some(temp.path().join("node_modules/dayjs/dayjs.min.js"))
        );
        assert_eq!(
            resolve_node_module(&nested, "dayjs/plugin/utc"),
            Some(temp.path().join("node_modules/dayjs/plugin/utc.js"))
        );
        assert_eq!(
            resolve_node_module(&nested, "plain"),
            Some(temp.path().join("node_modules/plain/index.js"))
        );
        assert_eq!(resolve_node_module(&nested, "absent"), None);
        assert_eq!(resolve_node_module(&nested, "node:fs"), None);
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(
            relative_path(Path::new("/out/es/components/button"), Path::new("/out/es/utils/index.mjs")),
            PathBuf::from("../../utils/index.mjs")
        );
        assert_eq!(to_specifier(Path::new("src/button.vue.mjs")), "./src/button.vue.mjs");
        assert_eq!(to_specifier(Path::new("../utils/index.mjs")), "../utils/index.mjs");
    }
}
