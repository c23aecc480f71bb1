//! Cross-language resource catalogs.
//!
//! One canonical language tree and its sibling trees are merged into a
//! single tree whose files map each language code to that language's
//! content. The canonical tree decides which files exist: a sibling missing
//! one of them fails the merge, and files only a sibling has are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::build::BuildContext;

/// Errors from the locale merge.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LocaleError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("missing '{language}' translation: {} does not exist", path.display())]
    MissingTranslation { language: String, path: PathBuf },

    #[error("canonical language '{language}' not found under {}", root.display())]
    MissingCanonical { language: String, root: PathBuf },

    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LocaleError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Result of a merge that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { files: Vec<PathBuf>, languages: Vec<String> },
    /// The output root existed; nothing was touched.
    AlreadyGenerated,
}

/// One canonical language tree plus its mirrored siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleTree {
    pub root: PathBuf,
    pub canonical: String,
    /// Sibling languages in declared order
    pub siblings: Vec<String>,
}

impl LocaleTree {
    pub fn new(root: impl Into<PathBuf>, canonical: impl Into<String>, siblings: Vec<String>) -> Self {
        Self { root: root.into(), canonical: canonical.into(), siblings }
    }

    /// Every language directory under `root`. Hidden entries are skipped and
    /// siblings are sorted by name.
    pub fn discover(root: &Path, canonical: &str) -> Result<Self, LocaleError> {
        let mut found = false;
        let mut siblings = Vec::new();
        for name in visible_entries(root)? {
            if !root.join(&name).is_dir() {
                continue;
            }
            if name == canonical {
                found = true;
            } else {
                siblings.push(name);
            }
        }
        if !found {
            return Err(LocaleError::MissingCanonical {
                language: canonical.to_string(),
                root: root.to_path_buf(),
            });
        }
        Ok(Self::new(root, canonical, siblings))
    }

    /// Canonical language first, then siblings in declared order.
    pub fn languages(&self) -> Vec<&str> {
        std::iter::once(self.canonical.as_str())
            .chain(self.siblings.iter().map(String::as_str))
            .collect()
    }

    fn language_root(&self, language: &str) -> PathBuf {
        self.root.join(language)
    }
}

/// Names of the non-hidden entries of `dir`, sorted.
fn visible_entries(dir: &Path) -> Result<Vec<String>, LocaleError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| LocaleError::io(dir, e))? {
        let entry = entry.map_err(|e| LocaleError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Parse one resource file; `.json5` files use the relaxed grammar.
fn read_resource(path: &Path) -> Result<Value, LocaleError> {
    let text = fs::read_to_string(path).map_err(|e| LocaleError::io(path, e))?;
    let parsed = if path.extension().is_some_and(|e| e == "json5") {
        json5::from_str::<Value>(&text).map_err(|e| e.to_string())
    } else {
        serde_json::from_str::<Value>(&text).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| LocaleError::Parse { path: path.to_path_buf(), message })
}

/// Merges a [`LocaleTree`] into an output tree.
#[derive(Debug, Clone)]
pub struct LocaleTreeMerger {
    tree: LocaleTree,
    output: PathBuf,
    manifest: String,
}

impl LocaleTreeMerger {
    pub fn new(tree: LocaleTree, output: impl Into<PathBuf>) -> Self {
        Self { tree, output: output.into(), manifest: "lang.json".to_string() }
    }

    pub fn with_manifest(mut self, name: impl Into<String>) -> Self {
        self.manifest = name.into();
        self
    }

    pub fn from_context(ctx: &BuildContext) -> Result<Self, LocaleError> {
        let locale = &ctx.config().locale;
        let tree = LocaleTree::discover(&ctx.resolve_path(&locale.source), &locale.canonical)?;
        Ok(Self::new(tree, ctx.resolve_path(&locale.output)).with_manifest(locale.manifest.clone()))
    }

    pub fn tree(&self) -> &LocaleTree {
        &self.tree
    }

    /// Merge the whole tree, or do nothing if the output root exists.
    ///
    /// The tree is merged into a sibling `<output>.partial` directory that
    /// only becomes the output root once every file merged, so a failed
    /// merge leaves no output behind.
    pub fn merge(&self) -> Result<MergeOutcome, LocaleError> {
        if self.output.exists() {
            info!("{} already exists, skipping locale merge", self.output.display());
            return Ok(MergeOutcome::AlreadyGenerated);
        }
        let staging = self.staging_root();
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| LocaleError::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| LocaleError::io(&staging, e))?;

        let (relative, languages) = match self.merge_into(&staging) {
            Ok(merged) => merged,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    debug!("could not remove {}: {}", staging.display(), cleanup);
                }
                return Err(e);
            }
        };
        fs::rename(&staging, &self.output).map_err(|e| LocaleError::io(&self.output, e))?;

        let mut files: Vec<PathBuf> = relative.iter().map(|r| self.output.join(r)).collect();
        files.sort();
        info!("merged {} resource file(s) for {} language(s)", files.len(), languages.len());
        Ok(MergeOutcome::Merged { files, languages })
    }

    /// `<output>.partial`
    fn staging_root(&self) -> PathBuf {
        let mut name = self.output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".partial");
        self.output.with_file_name(name)
    }

    /// Merge every file and the language manifest under `root`. Returns the
    /// merged files relative to `root`.
    fn merge_into(&self, root: &Path) -> Result<(Vec<PathBuf>, Vec<String>), LocaleError> {
        let files = self.merge_dir(root, Path::new(""))?;

        let languages: Vec<String> = self.tree.languages().into_iter().map(str::to_string).collect();
        let manifest = root.join(&self.manifest);
        let text = serde_json::to_string(&languages)
            .map_err(|source| LocaleError::Serialize { path: manifest.clone(), source })?;
        fs::write(&manifest, text).map_err(|e| LocaleError::io(&manifest, e))?;
        Ok((files, languages))
    }

    fn merge_dir(&self, root: &Path, relative: &Path) -> Result<Vec<PathBuf>, LocaleError> {
        let canonical_dir = self.tree.language_root(&self.tree.canonical).join(relative);
        let entries = visible_entries(&canonical_dir)?;
        self.note_extra_entries(relative, &entries);

        let nested: Vec<Vec<PathBuf>> = entries
            .par_iter()
            .map(|name| {
                let relative = relative.join(name);
                if canonical_dir.join(name).is_dir() {
                    let out = root.join(&relative);
                    fs::create_dir_all(&out).map_err(|e| LocaleError::io(&out, e))?;
                    self.merge_dir(root, &relative)
                } else {
                    self.merge_file(root, &relative).map(|()| vec![relative])
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(nested.into_iter().flatten().collect())
    }

    fn merge_file(&self, root: &Path, relative: &Path) -> Result<(), LocaleError> {
        let mut merged = Map::new();
        for language in self.tree.languages() {
            let path = self.tree.language_root(language).join(relative);
            if language != self.tree.canonical && !path.is_file() {
                return Err(LocaleError::MissingTranslation { language: language.to_string(), path });
            }
            merged.insert(language.to_string(), read_resource(&path)?);
        }

        let out = root.join(relative);
        let text = serde_json::to_string_pretty(&Value::Object(merged))
            .map_err(|source| LocaleError::Serialize { path: out.clone(), source })?;
        fs::write(&out, text).map_err(|e| LocaleError::io(&out, e))?;
        debug!("merged {}", relative.display());
        Ok(())
    }

    /// Sibling entries with no canonical counterpart are not merged.
    fn note_extra_entries(&self, relative: &Path, canonical: &[String]) {
        for sibling in &self.tree.siblings {
            let dir = self.tree.language_root(sibling).join(relative);
            let Ok(entries) = visible_entries(&dir) else {
                continue;
            };
            for name in entries.iter().filter(|n| !canonical.contains(n)) {
                debug!("ignoring {}: not present in '{}'", dir.join(name).display(), self.tree.canonical);
            }
        }
    }
}

/// Merge the catalogs configured for `ctx`.
pub fn merge_locales(ctx: &BuildContext) -> Result<MergeOutcome, LocaleError> {
    let output = ctx.resolve_path(&ctx.config().locale.output);
    if output.exists() {
        info!("{} already exists, skipping locale merge", output.display());
        return Ok(MergeOutcome::AlreadyGenerated);
    }
    LocaleTreeMerger::from_context(ctx)?.merge()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("should have parent")).expect("should create dirs");
        fs::write(path, contents).expect("should write file");
    }

    fn source(temp: &TempDir) -> PathBuf {
        let root = temp.path().join("source");
        write(&root, "en/a.json", r#"{"t":"hi"}"#);
        write(&root, "es/a.json", r#"{"t":"hola"}"#);
        root
    }

    #[test]
    fn test_merge_single_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let tree = LocaleTree::new(source(&temp), "en", vec!["es".to_string()]);
        let out = temp.path().join("merged");

        let outcome = LocaleTreeMerger::new(tree, &out).merge().expect("should merge");
        assert_eq!(
            outcome,
            MergeOutcome::Merged {
                files: vec![out.join("a.json")],
                languages: vec!["en".to_string(), "es".to_string()],
            }
        );

        let merged: Value =
            serde_json::from_str(&fs::read_to_string(out.join("a.json")).expect("should read"))
                .expect("should parse");
        assert_eq!(merged, serde_json::json!({"en": {"t": "hi"}, "es": {"t": "hola"}}));
        assert_eq!(fs::read_to_string(out.join("lang.json")).expect("should read"), r#"["en","es"]"#);
    }

    #[test]
    fn test_existing_output_is_a_no_op() {
        let temp = TempDir::new().expect("should create temp dir");
        let tree = LocaleTree::new(source(&temp), "en", vec!["es".to_string()]);
        let out = temp.path().join("merged");
        let merger = LocaleTreeMerger::new(tree, &out);

        merger.merge().expect("should merge");
        let before = fs::read_to_string(out.join("a.json")).expect("should read");
        write(&temp.path().join("source"), "es/a.json", r#"{"t":"changed"}"#);

        assert_eq!(merger.merge().expect("should skip"), MergeOutcome::AlreadyGenerated);
        assert_eq!(fs::read_to_string(out.join("a.json")).expect("should read"), before);
    }

    #[test]
    fn test_missing_translation_fails() {
        let temp = TempDir::new().expect("should create temp dir");
        let root = source(&temp);
        write(&root, "en/nested/b.json", "{}");
        let tree = LocaleTree::new(root, "en", vec!["es".to_string()]);

        let err = LocaleTreeMerger::new(tree, temp.path().join("merged"))
            .merge()
            .expect_err("should fail");
        assert!(matches!(err, LocaleError::MissingTranslation { ref language, .. } if language == "es"));
    }

    #[test]
    fn test_failed_merge_leaves_no_output_and_can_be_rerun() {
        let temp = TempDir::new().expect("should create temp dir");
        let root = source(&temp);
        write(&root, "en/b.json", r#"{"t":"bye"}"#);
        let out = temp.path().join("merged");
        let merger =
            LocaleTreeMerger::new(LocaleTree::new(&root, "en", vec!["es".to_string()]), &out);

        merger.merge().expect_err("es/b.json is missing");
        assert!(!out.exists());
        assert!(!temp.path().join("merged.partial").exists());

        write(&root, "es/b.json", r#"{"t":"adios"}"#);
        let outcome = merger.merge().expect("should merge once the translation exists");
        assert!(matches!(outcome, MergeOutcome::Merged { ref files, .. } if files.len() == 2));
        assert!(out.join("lang.json").is_file());
        assert!(!temp.path().join("merged.partial").exists());
    }

    #[test]
    fn test_nested_dirs_and_key_order() {
        let temp = TempDir::new().expect("should create temp dir");
        let root = temp.path().join("source");
        write(&root, "zh/pages/home.json", r#"{"z":1,"a":2}"#);
        write(&root, "en/pages/home.json", r#"{"z":"one","a":"two"}"#);
        write(&root, "de/pages/home.json5", "{z: 'eins', a: 'zwei',}");
        write(&root, "zh/pages/home.json5", "{z: 'yi', a: 'er'}");
        write(&root, "en/pages/home.json5", "{z: 'one', a: 'two'}");
        write(&root, "de/pages/home.json", r#"{"z":"eins","a":"zwei"}"#);
        let tree = LocaleTree::discover(&root, "zh").expect("should discover");
        assert_eq!(tree.languages(), vec!["zh", "de", "en"]);

        let out = temp.path().join("merged");
        LocaleTreeMerger::new(tree, &out).merge().expect("should merge");
        let text = fs::read_to_string(out.join("pages/home.json")).expect("should read");
        assert!(text.starts_with("{\n  \"zh\": {\n    \"z\": 1,\n    \"a\": 2\n  },\n  \"de\""));
        let json5_merged = fs::read_to_string(out.join("pages/home.json5")).expect("should read");
        assert!(json5_merged.contains("\"de\": {\n    \"z\": \"eins\""));
    }

    #[test]
    fn test_extra_sibling_files_are_ignored() {
        let temp = TempDir::new().expect("should create temp dir");
        let root = source(&temp);
        write(&root, "es/only-es.json", "{}");
        let tree = LocaleTree::new(root, "en", vec!["es".to_string()]);
        let out = temp.path().join("merged");

        LocaleTreeMerger::new(tree, &out).merge().expect("should merge");
        assert!(!out.join("only-es.json").exists());
    }

    #[test]
    fn test_discover_skips_hidden_entries() {
        let temp = TempDir::new().expect("should create temp dir");
        let root = source(&temp);
        write(&root, ".DS_Store", "");
        fs::create_dir_all(root.join(".cache")).expect("should create dir");
        let tree = LocaleTree::discover(&root, "en").expect("should discover");
        assert_eq!(tree.siblings, vec!["es".to_string()]);

        let err = LocaleTree::discover(&root, "fr").expect_err("should require canonical");
        assert!(matches!(err, LocaleError::MissingCanonical { .. }));
    }
}
