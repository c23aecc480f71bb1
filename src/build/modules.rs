//! Tree-preserving module outputs.
//!
//! Every discovered unit compiles to one file in `es/` (ESM) and one in
//! `lib/` (CommonJS), mirroring its logical path. Imports of other units are
//! rewritten to the relative path of that unit's output in the same format;
//! dependencies stay external. Both formats compile in parallel and nothing
//! is written unless both fully succeed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::build::discovery::{discover_module_units, SourceUnit};
use crate::build::emit::{write_outputs, EmittedFile};
use crate::build::target::BuildTarget;
use crate::build::{BuildContext, BundleError};
use crate::compile::sourcemap::mapping_url_comment;
use crate::compile::{Compiler, LinkMap, ModuleSource};
use crate::resolve::node::{
    is_relative, normalize, probe, relative_path, resolve_relative, to_specifier,
};
use crate::resolve::{AliasRewriter, DependencyClassifier, ResolveError};

/// How one import of a unit is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleLink {
    /// Emit this specifier instead
    Rewrite(String),
    /// Keep the specifier as written
    Keep,
    /// Keep the specifier as written; it matched no dependency rule
    Implicit,
}

/// Output of a module build.
#[derive(Debug, Default)]
pub struct ModulesOutput {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

pub struct ModuleBundler<'a> {
    ctx: &'a BuildContext,
    compiler: &'a dyn Compiler,
    classifier: DependencyClassifier,
    aliases: AliasRewriter,
}

impl<'a> ModuleBundler<'a> {
    pub fn new(
        ctx: &'a BuildContext,
        compiler: &'a dyn Compiler,
        classifier: DependencyClassifier,
        aliases: AliasRewriter,
    ) -> Self {
        Self { ctx, compiler, classifier, aliases }
    }

    /// Bundler with the classifier and alias rules of a context.
    pub fn from_context(
        ctx: &'a BuildContext,
        compiler: &'a dyn Compiler,
    ) -> Result<Self, BundleError> {
        let classifier = DependencyClassifier::from_context(ctx)?;
        Ok(Self::new(ctx, compiler, classifier, AliasRewriter::from_context(ctx)))
    }

    /// Compile both module formats and write them.
    pub fn build(&self) -> Result<ModulesOutput, BundleError> {
        let units = discover_module_units(self.ctx)?;
        info!(units = units.len(), "compiling module tree");
        let (files, warnings) = self.compile(&units)?;
        let files = write_outputs(&files)?;
        for warning in &warnings {
            warn!("{}", warning);
        }
        Ok(ModulesOutput { files, warnings })
    }

    /// Compile `units` in both formats without writing anything.
    pub fn compile(
        &self,
        units: &[SourceUnit],
    ) -> Result<(Vec<EmittedFile>, Vec<String>), BundleError> {
        let index: HashMap<PathBuf, &SourceUnit> =
            units.iter().map(|unit| (normalize(&unit.path), unit)).collect();
        let [esm, cjs] = BuildTarget::module_targets();
        let (esm_out, cjs_out) = rayon::join(
            || self.compile_target(esm, units, &index),
            || self.compile_target(cjs, units, &index),
        );
        let (mut files, mut warnings) = esm_out?;
        let (cjs_files, cjs_warnings) = cjs_out?;
        files.extend(cjs_files);
        warnings.extend(cjs_warnings);
        warnings.sort();
        warnings.dedup();
        Ok((files, warnings))
    }

    fn compile_target(
        &self,
        target: BuildTarget,
        units: &[SourceUnit],
        index: &HashMap<PathBuf, &SourceUnit>,
    ) -> Result<(Vec<EmittedFile>, Vec<String>), BundleError> {
        debug!(target = %target, "compiling units");
        let compiled = units
            .par_iter()
            .map(|unit| self.compile_unit(unit, target, index))
            .collect::<Result<Vec<_>, _>>()?;
        let mut files = Vec::with_capacity(compiled.len() * 2);
        let mut warnings = Vec::new();
        for (unit_files, unit_warnings) in compiled {
            files.extend(unit_files);
            warnings.extend(unit_warnings);
        }
        Ok((files, warnings))
    }

    fn compile_unit(
        &self,
        unit: &SourceUnit,
        target: BuildTarget,
        index: &HashMap<PathBuf, &SourceUnit>,
    ) -> Result<(Vec<EmittedFile>, Vec<String>), BundleError> {
        let source = ModuleSource::read(&unit.path)?;
        let info = self.compiler.analyze(&source)?;

        let mut links = LinkMap::new();
        let mut warnings = Vec::new();
        for specifier in &info.imports {
            match self.resolve(unit, specifier, target, index)? {
                ModuleLink::Rewrite(rewritten) => {
                    links.insert(specifier.clone(), rewritten);
                }
                ModuleLink::Keep => {}
                ModuleLink::Implicit => warnings.push(format!(
                    "{}: '{}' is not a declared dependency, treating it as external",
                    unit.id(),
                    specifier
                )),
            }
        }

        let chunk = self.compiler.compile(&source, &links, target.format)?;
        let output = self
            .ctx
            .package_output()
            .join(target.format.tree_dir())
            .join(target.tree_output(&unit.logical));
        let file_name =
            output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let map_name = format!("{}.map", file_name);

        let mut code = chunk.code;
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&mapping_url_comment(&map_name));
        code.push('\n');

        let mut files = vec![EmittedFile::new(output.clone(), code)];
        if let Some(map) = chunk.map {
            files.push(EmittedFile::new(output.with_file_name(&map_name), map.to_json(&output)));
        }
        Ok((files, warnings))
    }

    /// Decide how `specifier`, imported by `unit`, is emitted for `target`.
    pub fn resolve(
        &self,
        unit: &SourceUnit,
        specifier: &str,
        target: BuildTarget,
        index: &HashMap<PathBuf, &SourceUnit>,
    ) -> Result<ModuleLink, BundleError> {
        if let Some(alias) = self.aliases.rewrite(specifier) {
            return Ok(ModuleLink::Rewrite(alias.id));
        }
        if self.classifier.is_external(specifier, false) {
            return Ok(ModuleLink::Keep);
        }

        let importer_dir = unit.path.parent().unwrap_or(Path::new(""));
        let resolved = if is_relative(specifier) {
            resolve_relative(importer_dir, specifier)
        } else if let Some(scoped) = self.ctx.scope_path(specifier) {
            probe(&scoped)
        } else {
            return Ok(ModuleLink::Implicit);
        };

        let Some(resolved) = resolved else {
            return Err(ResolveError::Unresolved {
                specifier: specifier.to_string(),
                importer: unit.path.clone(),
            }
            .into());
        };
        match index.get(&normalize(&resolved)) {
            Some(dependency) => {
                let from = target.tree_output(&unit.logical);
                let to = target.tree_output(&dependency.logical);
                let from_dir = from.parent().unwrap_or(Path::new(""));
                Ok(ModuleLink::Rewrite(to_specifier(&relative_path(from_dir, &to))))
            }
            None => Ok(ModuleLink::Keep),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::target::ModuleFormat;
    use crate::compile::ScriptCompiler;
    use crate::config::KilnConfig;
    use crate::resolve::DependencySet;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("should have parent")).expect("should mkdir");
        fs::write(path, contents).expect("should write");
    }

    fn context(root: &Path) -> BuildContext {
        let mut config = KilnConfig::default();
        config.project.entry = "ui".to_string();
        config.naming.scope = "@ui".to_string();
        config.naming.package = "ui".to_string();
        BuildContext::new(config, root.to_path_buf())
    }

    fn classifier() -> DependencyClassifier {
        DependencyClassifier::new(DependencySet {
            dependencies: vec!["dayjs".to_string()],
            peer_dependencies: vec!["vue".to_string()],
            reserved_scope: "@vue".to_string(),
        })
    }

    fn project() -> TempDir {
        let temp = TempDir::new().expect("should create temp dir");
        write(temp.path(), "packages/ui/index.ts", "export * from '@ui/components'\n");
        write(
            temp.path(),
            "packages/components/index.ts",
            "export { default as ElTag } from './tag/src/tag.vue'\nexport * from './utils'\n",
        );
        write(
            temp.path(),
            "packages/components/utils.ts",
            "import dayjs from 'dayjs'\nimport { ref } from 'vue'\nimport '@ui/theme-chalk/tag.css'\nexport const now = () => dayjs()\nexport const counter = ref(0)\n",
        );
        write(
            temp.path(),
            "packages/components/tag/src/tag.vue",
            "<template><span /></template>\n<script lang=\"ts\">\nexport default { name: 'ElTag' }\n</script>\n",
        );
        temp
    }

    fn bundler<'a>(ctx: &'a BuildContext, compiler: &'a ScriptCompiler) -> ModuleBundler<'a> {
        ModuleBundler::new(ctx, compiler, classifier(), AliasRewriter::from_context(ctx))
    }

    #[test]
    fn test_resolution_order() {
        let temp = project();
        let ctx = context(temp.path());
        let compiler = ScriptCompiler;
        let bundler = bundler(&ctx, &compiler);
        let units = discover_module_units(&ctx).expect("should discover");
        let index: HashMap<PathBuf, &SourceUnit> =
            units.iter().map(|u| (normalize(&u.path), u)).collect();
        let utils = units
            .iter()
            .find(|u| u.id() == "components/utils.ts")
            .expect("should find utils unit");
        let esm = BuildTarget::module(ModuleFormat::Esm);

        assert_eq!(
            bundler.resolve(utils, "@ui/theme-chalk/tag.css", esm, &index).expect("alias"),
            ModuleLink::Rewrite("ui/theme-chalk/tag.css".to_string())
        );
        assert_eq!(bundler.resolve(utils, "dayjs", esm, &index).expect("dep"), ModuleLink::Keep);
        assert_eq!(
            bundler.resolve(utils, "@vue/shared", esm, &index).expect("reserved"),
            ModuleLink::Keep
        );
        assert_eq!(
            bundler.resolve(utils, "./tag/src/tag.vue", esm, &index).expect("unit"),
            ModuleLink::Rewrite("./tag/src/tag.vue.mjs".to_string())
        );
        assert_eq!(
            bundler.resolve(utils, "lodash", esm, &index).expect("implicit"),
            ModuleLink::Implicit
        );
        assert!(matches!(
            bundler.resolve(utils, "./missing", esm, &index),
            Err(BundleError::Resolve(ResolveError::Unresolved { .. }))
        ));
    }

    #[test]
    fn test_internal_scope_links_to_relative_output() {
        let temp = project();
        let ctx = context(temp.path());
        let compiler = ScriptCompiler;
        let bundler = bundler(&ctx, &compiler);
        let units = discover_module_units(&ctx).expect("should discover");
        let index: HashMap<PathBuf, &SourceUnit> =
            units.iter().map(|u| (normalize(&u.path), u)).collect();
        let entry = units.iter().find(|u| u.id() == "index.ts").expect("should find entry");

        let cjs = BuildTarget::module(ModuleFormat::Cjs);
        assert_eq!(
            bundler.resolve(entry, "@ui/components", cjs, &index).expect("scope"),
            ModuleLink::Rewrite("./components/index.js".to_string())
        );
    }

    #[test]
    fn test_compile_emits_both_formats_with_maps() {
        let temp = project();
        let ctx = context(temp.path());
        let compiler = ScriptCompiler;
        let bundler = bundler(&ctx, &compiler);
        let units = discover_module_units(&ctx).expect("should discover");
        let (files, warnings) = bundler.compile(&units).expect("should compile");
        assert!(warnings.is_empty());

        let out = ctx.package_output();
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        for rel in [
            "es/index.mjs",
            "es/index.mjs.map",
            "es/components/tag/src/tag.vue.mjs",
            "lib/components/utils.js",
            "lib/components/utils.js.map",
        ] {
            assert!(paths.contains(&out.join(rel)), "missing {}", rel);
        }

        let esm_index = files
            .iter()
            .find(|f| f.path == out.join("es/components/index.mjs"))
            .expect("should emit es index");
        assert!(esm_index.contents.contains("from \"./tag/src/tag.vue.mjs\""));
        assert!(esm_index.contents.contains("export * from \"./utils.mjs\""));
        assert!(esm_index.contents.ends_with("//# sourceMappingURL=index.mjs.map\n"));

        let cjs_utils = files
            .iter()
            .find(|f| f.path == out.join("lib/components/utils.js"))
            .expect("should emit lib utils");
        assert!(cjs_utils.contents.contains("require(\"ui/theme-chalk/tag.css\")"));
        assert!(cjs_utils.contents.contains("require(\"dayjs\")"));
    }

    #[test]
    fn test_compile_error_is_fatal() {
        let temp = project();
        write(temp.path(), "packages/components/broken.ts", "import { a } from './nowhere'\n");
        let ctx = context(temp.path());
        let compiler = ScriptCompiler;
        let bundler = bundler(&ctx, &compiler);
        let units = discover_module_units(&ctx).expect("should discover");
        assert!(bundler.compile(&units).is_err());
    }
}
