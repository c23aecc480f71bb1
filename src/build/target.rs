//! Build target definitions.
//!
//! A build target is one output flavour of a bundler run: a module format,
//! the output layout and whether the output is minified.

use std::path::PathBuf;

/// Module format of emitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleFormat {
    /// ECMAScript modules
    Esm,
    /// CommonJS
    Cjs,
    /// Browser-global UMD wrapper
    Umd,
}

impl ModuleFormat {
    /// File extension of outputs in this format.
    pub fn extension(self) -> &'static str {
        match self {
            ModuleFormat::Esm => "mjs",
            ModuleFormat::Cjs | ModuleFormat::Umd => "js",
        }
    }

    /// Output directory of the tree-preserving layout.
    pub fn tree_dir(self) -> &'static str {
        match self {
            ModuleFormat::Esm => "es",
            ModuleFormat::Cjs | ModuleFormat::Umd => "lib",
        }
    }
}

impl std::fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleFormat::Esm => write!(f, "esm"),
            ModuleFormat::Cjs => write!(f, "cjs"),
            ModuleFormat::Umd => write!(f, "umd"),
        }
    }
}

/// How outputs are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputLayout {
    /// One output file per input unit, mirroring the logical tree
    Tree,
    /// Everything linked into one file
    SingleFile,
}

/// One output flavour of a bundler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildTarget {
    pub format: ModuleFormat,
    pub layout: OutputLayout,
    pub minify: bool,
}

impl BuildTarget {
    /// A tree-preserving module target.
    pub fn module(format: ModuleFormat) -> Self {
        Self { format, layout: OutputLayout::Tree, minify: false }
    }

    /// A single-file bundle target.
    pub fn bundle(format: ModuleFormat, minify: bool) -> Self {
        Self { format, layout: OutputLayout::SingleFile, minify }
    }

    /// The ESM and CommonJS tree targets.
    pub fn module_targets() -> [BuildTarget; 2] {
        [Self::module(ModuleFormat::Esm), Self::module(ModuleFormat::Cjs)]
    }

    /// UMD and ESM bundles, each plain and minified.
    pub fn bundle_targets() -> [BuildTarget; 4] {
        [
            Self::bundle(ModuleFormat::Umd, false),
            Self::bundle(ModuleFormat::Umd, true),
            Self::bundle(ModuleFormat::Esm, false),
            Self::bundle(ModuleFormat::Esm, true),
        ]
    }

    /// Bundle file name for a stem: `<stem>[.min].<ext>`.
    pub fn file_name(&self, stem: &str) -> String {
        if self.minify {
            format!("{}.min.{}", stem, self.format.extension())
        } else {
            format!("{}.{}", stem, self.format.extension())
        }
    }

    /// Path of a unit's output in the tree layout.
    ///
    /// Component units keep their extension (`a.vue` -> `a.vue.mjs`) so they
    /// never collide with a sibling script of the same stem; script units
    /// replace it (`a.ts` -> `a.mjs`).
    pub fn tree_output(&self, logical: &std::path::Path) -> PathBuf {
        let ext = self.format.extension();
        match logical.extension().and_then(|e| e.to_str()) {
            Some("vue") => {
                let mut name = logical.as_os_str().to_os_string();
                name.push(".");
                name.push(ext);
                PathBuf::from(name)
            }
            _ => logical.with_extension(ext),
        }
    }

    /// Identifier used in logs and task results, e.g. `umd.min`.
    pub fn id(&self) -> String {
        match (self.layout, self.minify) {
            (OutputLayout::Tree, _) => self.format.tree_dir().to_string(),
            (OutputLayout::SingleFile, true) => format!("{}.min", self.format),
            (OutputLayout::SingleFile, false) => self.format.to_string(),
        }
    }
}

impl std::fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_module_targets() {
        let [esm, cjs] = BuildTarget::module_targets();
        assert_eq!(esm.format.tree_dir(), "es");
        assert_eq!(cjs.format.tree_dir(), "lib");
        assert_eq!(esm.layout, OutputLayout::Tree);
        assert!(!esm.minify && !cjs.minify);
    }

    #[test]
    fn test_bundle_file_names() {
        let names: Vec<_> =
            BuildTarget::bundle_targets().iter().map(|t| t.file_name("index.full")).collect();
        assert_eq!(
            names,
            vec!["index.full.js", "index.full.min.js", "index.full.mjs", "index.full.min.mjs"]
        );
    }

    #[test]
    fn test_tree_output_paths() {
        let esm = BuildTarget::module(ModuleFormat::Esm);
        let cjs = BuildTarget::module(ModuleFormat::Cjs);
        assert_eq!(
            esm.tree_output(Path::new("components/button/index.ts")),
            PathBuf::from("components/button/index.mjs")
        );
        assert_eq!(
            cjs.tree_output(Path::new("components/button/src/button.vue")),
            PathBuf::from("components/button/src/button.vue.js")
        );
    }

    #[test]
    fn test_target_ids() {
        assert_eq!(BuildTarget::module(ModuleFormat::Esm).id(), "es");
        assert_eq!(BuildTarget::bundle(ModuleFormat::Umd, true).id(), "umd.min");
        assert_eq!(BuildTarget::bundle(ModuleFormat::Esm, false).to_string(), "esm");
    }
}
