//! Self-contained browser bundles.
//!
//! Starting from the entry package's `index`, every reachable module that is
//! not a peer dependency or an aliased style import is inlined, node_modules
//! included. The result is linked into a UMD and an ESM container, each
//! emitted plain and minified. Every top-level locale source gets the same
//! four variants as a standalone bundle whose UMD global is its default
//! export.
//!
//! Inlined modules are built for production: `process.env.NODE_ENV` reads
//! are replaced by `"production"` so the bundle never touches `process`.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::build::discovery::{discover_locale_sources, slash_path};
use crate::build::emit::{write_outputs, EmittedFile};
use crate::build::target::{BuildTarget, ModuleFormat};
use crate::build::{BuildContext, BundleError};
use crate::compile::sourcemap::mapping_url_comment;
use crate::compile::{
    BundleExports, BundleInput, BundleModule, Chunk, Compiler, ExternalGlobal, LinkMap,
    ModuleInfo, ModuleSource,
};
use crate::config::schema::{camel_case, pascal_case};
use crate::resolve::node::{
    is_relative, is_script_file, normalize, probe, resolve_node_module, resolve_relative,
};
use crate::resolve::{AliasRewriter, DependencyClassifier, PackageManifest, ResolveError};

/// How one import is handled inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleLink {
    /// Left to the environment under this specifier
    External(String),
    /// Inlined from this file
    Inline(PathBuf),
}

/// One single-file bundle to produce in all four variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSpec {
    pub entry: PathBuf,
    /// Output directory
    pub dir: PathBuf,
    /// File stem, e.g. `index.full` or `zh-cn`
    pub stem: String,
    /// UMD global
    pub global_name: String,
    /// Expose named exports; otherwise only the default export is exposed
    pub named_exports: bool,
}

/// Output of a full-bundle build.
#[derive(Debug, Default)]
pub struct FullBundleOutput {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
struct GraphModule {
    id: String,
    source: ModuleSource,
    info: ModuleInfo,
    links: LinkMap,
}

/// Every module reachable from an entry.
#[derive(Debug)]
struct BundleGraph {
    entry: String,
    modules: Vec<GraphModule>,
    externals: BTreeSet<String>,
}

impl BundleGraph {
    fn module(&self, id: &str) -> Option<&GraphModule> {
        self.modules.iter().find(|m| m.id == id)
    }
}

pub struct FullBundleBuilder<'a> {
    ctx: &'a BuildContext,
    compiler: &'a dyn Compiler,
    classifier: DependencyClassifier,
    aliases: AliasRewriter,
    banner: String,
}

impl<'a> FullBundleBuilder<'a> {
    pub fn new(
        ctx: &'a BuildContext,
        compiler: &'a dyn Compiler,
        classifier: DependencyClassifier,
        aliases: AliasRewriter,
        version: &str,
    ) -> Self {
        let banner = format!("/*! {} v{} */", ctx.config().naming.brand(), version);
        Self { ctx, compiler, classifier, aliases, banner }
    }

    /// Builder with the classifier, alias rules and version of a context.
    pub fn from_context(
        ctx: &'a BuildContext,
        compiler: &'a dyn Compiler,
    ) -> Result<Self, BundleError> {
        let manifest = PackageManifest::load(&ctx.entry_manifest())?;
        let version = manifest.version.unwrap_or_else(|| "0.0.0".to_string());
        let classifier = DependencyClassifier::from_context(ctx)?;
        Ok(Self::new(ctx, compiler, classifier, AliasRewriter::from_context(ctx), &version))
    }

    /// The entry bundle plus one bundle per locale source.
    pub fn specs(&self) -> Result<Vec<BundleSpec>, BundleError> {
        let entry_dir = self.ctx.entry_dir();
        let entry = probe(&entry_dir.join("index")).ok_or_else(|| ResolveError::Unresolved {
            specifier: "./index".to_string(),
            importer: entry_dir.clone(),
        })?;
        let dist = self.ctx.dist_dir();
        let naming = &self.ctx.config().naming;

        let mut specs = vec![BundleSpec {
            entry,
            dir: dist.clone(),
            stem: self.ctx.config().entry_name().to_string(),
            global_name: naming.namespace(),
            named_exports: true,
        }];
        for locale in discover_locale_sources(self.ctx)? {
            let Some(stem) = locale.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            specs.push(BundleSpec {
                entry: locale,
                dir: dist.join("locale"),
                global_name: format!("{}{}", naming.locale_namespace(), pascal_case(&stem)),
                stem,
                named_exports: false,
            });
        }
        Ok(specs)
    }

    /// Produce and write every bundle. Nothing is written if any fails.
    pub fn build(&self) -> Result<FullBundleOutput, BundleError> {
        let specs = self.specs()?;
        info!(bundles = specs.len(), "building self-contained bundles");
        let results = specs
            .par_iter()
            .map(|spec| self.bundle(spec))
            .collect::<Result<Vec<_>, _>>()?;

        let mut files = Vec::new();
        let mut warnings = Vec::new();
        for (bundle_files, bundle_warnings) in results {
            files.extend(bundle_files);
            warnings.extend(bundle_warnings);
        }
        warnings.sort();
        warnings.dedup();
        let files = write_outputs(&files)?;
        for warning in &warnings {
            warn!("{}", warning);
        }
        Ok(FullBundleOutput { files, warnings })
    }

    /// Compile one bundle in all four variants, in memory.
    pub fn bundle(&self, spec: &BundleSpec) -> Result<(Vec<EmittedFile>, Vec<String>), BundleError> {
        let graph = self.collect_graph(&spec.entry)?;
        debug!(entry = %graph.entry, modules = graph.modules.len(), "collected bundle graph");
        let mut warnings = Vec::new();

        let modules = graph
            .modules
            .par_iter()
            .map(|module| -> Result<BundleModule, BundleError> {
                let chunk = self.compiler.compile(&module.source, &module.links, ModuleFormat::Cjs)?;
                Ok(BundleModule { id: module.id.clone(), chunk })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let externals: Vec<ExternalGlobal> = graph
            .externals
            .iter()
            .map(|specifier| {
                let global = match self.ctx.config().bundle.globals.get(specifier) {
                    Some(global) => global.clone(),
                    None => {
                        let guess = camel_case(specifier);
                        warnings.push(format!(
                            "no global configured for external '{}', guessing '{}'",
                            specifier, guess
                        ));
                        guess
                    }
                };
                ExternalGlobal { specifier: specifier.clone(), global }
            })
            .collect();

        let exports = if spec.named_exports {
            let (names, star_warnings) = export_names(&graph);
            warnings.extend(star_warnings);
            BundleExports::Named(names)
        } else {
            BundleExports::Default
        };

        let files = BuildTarget::bundle_targets()
            .par_iter()
            .map(|target| {
                let input = BundleInput {
                    format: target.format,
                    modules: &modules,
                    entry: &graph.entry,
                    externals: &externals,
                    global_name: &spec.global_name,
                    exports: exports.clone(),
                    banner: Some(&self.banner),
                };
                self.emit_target(spec, *target, &input)
            })
            .collect::<Result<Vec<_>, BundleError>>()?;
        Ok((files.into_iter().flatten().collect(), warnings))
    }

    fn emit_target(
        &self,
        spec: &BundleSpec,
        target: BuildTarget,
        input: &BundleInput<'_>,
    ) -> Result<Vec<EmittedFile>, BundleError> {
        let name = target.file_name(&spec.stem);
        let output = spec.dir.join(&name);
        let linked = self.compiler.link(input)?;
        if target.minify {
            let Chunk { code, .. } = self.compiler.minify(&name, &linked, target.format)?;
            return Ok(vec![EmittedFile::new(output, format!("{}\n{}\n", self.banner, code.trim_end()))]);
        }

        let map_name = format!("{}.map", name);
        let mut code = linked.code;
        code.push_str(&mapping_url_comment(&map_name));
        code.push('\n');
        let mut files = vec![EmittedFile::new(output.clone(), code)];
        if let Some(map) = linked.map {
            files.push(EmittedFile::new(spec.dir.join(&map_name), map.to_json(&output)));
        }
        Ok(files)
    }

    /// Walk every module reachable from `entry`, breadth first.
    fn collect_graph(&self, entry: &Path) -> Result<BundleGraph, BundleError> {
        let entry = normalize(entry);
        let entry_id = self.module_id(&entry);
        let mut ids: HashMap<PathBuf, String> = HashMap::from([(entry.clone(), entry_id.clone())]);
        let mut queue = VecDeque::from([entry]);
        let mut modules = Vec::new();
        let mut externals = BTreeSet::new();

        while let Some(path) = queue.pop_front() {
            let mut source = ModuleSource::read(&path)?;
            if let Cow::Owned(defined) = define_production_env(&source.text) {
                source.text = defined;
            }
            let info = self.compiler.analyze(&source)?;
            let mut links = LinkMap::new();
            for specifier in &info.imports {
                match self.resolve(&path, specifier)? {
                    BundleLink::External(id) => {
                        if id != *specifier {
                            links.insert(specifier.clone(), id.clone());
                        }
                        externals.insert(id);
                    }
                    BundleLink::Inline(target) => {
                        let target = normalize(&target);
                        let id = match ids.get(&target) {
                            Some(id) => id.clone(),
                            None => {
                                let id = self.module_id(&target);
                                ids.insert(target.clone(), id.clone());
                                queue.push_back(target);
                                id
                            }
                        };
                        links.insert(specifier.clone(), id);
                    }
                }
            }
            let id = ids.get(&path).cloned().unwrap_or_else(|| self.module_id(&path));
            modules.push(GraphModule { id, source, info, links });
        }
        Ok(BundleGraph { entry: entry_id, modules, externals })
    }

    /// Decide whether `specifier`, imported from `importer`, is inlined.
    pub fn resolve(&self, importer: &Path, specifier: &str) -> Result<BundleLink, BundleError> {
        if let Some(alias) = self.aliases.rewrite(specifier) {
            return Ok(BundleLink::External(alias.id));
        }
        if self.classifier.is_external(specifier, true) {
            return Ok(BundleLink::External(specifier.to_string()));
        }

        let importer_dir = importer.parent().unwrap_or(Path::new(""));
        let resolved = if is_relative(specifier) {
            resolve_relative(importer_dir, specifier)
        } else if let Some(scoped) = self.ctx.scope_path(specifier) {
            probe(&scoped)
        } else {
            resolve_node_module(importer_dir, specifier)
        };
        match resolved {
            Some(path) if is_script_file(&path) => Ok(BundleLink::Inline(path)),
            Some(path) => Err(BundleError::NotScript { path, importer: importer.to_path_buf() }),
            None => Err(ResolveError::Unresolved {
                specifier: specifier.to_string(),
                importer: importer.to_path_buf(),
            }
            .into()),
        }
    }

    fn module_id(&self, path: &Path) -> String {
        match path.strip_prefix(self.ctx.project_root()) {
            Ok(relative) => slash_path(relative),
            Err(_) => slash_path(path),
        }
    }
}

static NODE_ENV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w$.])process\.env\.NODE_ENV\b(\s*=[^=>])?")
        .unwrap_or_else(|e| panic!("BUG: invalid define regex: {}", e))
});

/// Replace reads of `process.env.NODE_ENV` with `"production"`.
/// Assignments to it are left alone.
pub fn define_production_env(text: &str) -> Cow<'_, str> {
    NODE_ENV.replace_all(text, |caps: &Captures<'_>| {
        if caps.get(2).is_some() {
            caps[0].to_string()
        } else {
            format!("{}\"production\"", &caps[1])
        }
    })
}

/// Named exports of the entry module, following `export *` through inlined
/// modules. Names re-exported from externals cannot be listed statically.
fn export_names(graph: &BundleGraph) -> (Vec<String>, Vec<String>) {
    let mut names = Vec::new();
    let mut warnings = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(graph.entry.as_str(), true)];

    while let Some((id, include_default)) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(module) = graph.module(id) else {
            continue;
        };
        for name in &module.info.exports {
            if (include_default || name != "default") && !names.contains(name) {
                names.push(name.clone());
            }
        }
        for star in module.info.star_exports.iter().rev() {
            match module.links.get(star).and_then(|target| graph.module(target)) {
                Some(target) => stack.push((target.id.as_str(), false)),
                None => warnings.push(format!(
                    "{}: names re-exported from external '{}' are not exported by the ESM bundle",
                    module.id, star
                )),
            }
        }
    }
    (names, warnings)
}
