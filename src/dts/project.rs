//! The whole-project type check.
//!
//! A [`TypeProject`] is populated with the environment units and every
//! derived unit, staged under one directory and checked by a single
//! compiler run. Only a clean run yields a [`TypeProject<Checked>`], which
//! holds the declarations the compiler produced.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use crate::build::discovery::slash_path;
use crate::build::emit::EmittedFile;
use crate::resolve::SpecifierRewriter;

use super::compiler::{parse_diagnostics, TypeCompiler};
use super::{DeclarationError, DeclarationUnit};

/// Project state before the check.
#[derive(Debug)]
pub enum Open {}

/// Project state after a successful check.
#[derive(Debug)]
pub enum Checked {}

/// Directory, under the staging root, the compiler writes declarations to.
const OUT_DIR: &str = ".out";

/// Directory, under the staging root, for environment units that live
/// outside the packages tree.
const AMBIENT_DIR: &str = ".ambient";

/// Maps internal-scope specifiers onto the staged tree.
#[derive(Debug, Clone)]
pub struct ScopeMap {
    pub scope: String,
    /// Directory name of the hoisted entry package
    pub entry: String,
}

impl ScopeMap {
    /// `compilerOptions.paths` for the staged tree: `@scope/x` resolves to
    /// `x` and the entry package resolves to the logical root.
    pub fn paths(&self) -> Map<String, Value> {
        let mut paths = Map::new();
        paths.insert(format!("{}/{}", self.scope, self.entry), json!(["./index"]));
        paths.insert(format!("{}/{}/*", self.scope, self.entry), json!(["./*"]));
        paths.insert(format!("{}/*", self.scope), json!(["./*"]));
        paths
    }
}

/// Units registered for one check.
#[derive(Debug)]
pub struct TypeProject<State = Open> {
    scope: ScopeMap,
    /// Packages directory; relative imports of non-script files resolve here
    sources: PathBuf,
    /// Environment declarations: checked, never emitted
    ambient: Vec<DeclarationUnit>,
    units: Vec<DeclarationUnit>,
    /// Declaration text by unit id
    declarations: BTreeMap<PathBuf, String>,
    state: PhantomData<State>,
}

impl TypeProject<Open> {
    pub fn new(scope: ScopeMap, sources: impl Into<PathBuf>) -> Self {
        Self {
            scope,
            sources: sources.into(),
            ambient: Vec::new(),
            units: Vec::new(),
            declarations: BTreeMap::new(),
            state: PhantomData,
        }
    }

    /// Register an environment unit (`*.d.ts`).
    pub fn add_ambient(&mut self, unit: DeclarationUnit) {
        self.ambient.push(unit);
    }

    /// Register derived units.
    pub fn register(&mut self, units: impl IntoIterator<Item = DeclarationUnit>) {
        self.units.extend(units);
    }

    /// Stage the project under `staging`, run `compiler` over it and collect
    /// the declarations. Any diagnostic fails the whole project.
    ///
    /// The staging directory is removed afterwards, whatever the outcome.
    pub fn check(
        self,
        compiler: &dyn TypeCompiler,
        staging: &Path,
    ) -> Result<TypeProject<Checked>, DeclarationError> {
        let dir = StagingDir::create(staging)?;
        let declarations = self.run(compiler, dir.path())?;
        Ok(TypeProject {
            scope: self.scope,
            sources: self.sources,
            ambient: self.ambient,
            units: self.units,
            declarations,
            state: PhantomData,
        })
    }

    fn run(
        &self,
        compiler: &dyn TypeCompiler,
        root: &Path,
    ) -> Result<BTreeMap<PathBuf, String>, DeclarationError> {
        // staged path (slash separated, relative to `root`) -> unit id
        let mut staged: HashMap<String, PathBuf> = HashMap::new();
        for (index, unit) in self.ambient.iter().enumerate() {
            let relative = ambient_location(index, &unit.id);
            write_staged(root, &relative, &unit.content)?;
            staged.insert(slash_path(&relative), unit.id.clone());
        }
        for unit in &self.units {
            write_staged(root, &unit.id, &unit.content)?;
            staged.insert(slash_path(&unit.id), unit.id.clone());
        }

        let mut files: Vec<&String> = staged.keys().collect();
        files.sort();
        let tsconfig = root.join("tsconfig.json");
        let config = self.tsconfig(&files);
        fs::write(&tsconfig, format!("{:#}", config))
            .map_err(|source| DeclarationError::Io { path: tsconfig.clone(), source })?;

        debug!("checking {} staged file(s) with {}", files.len(), compiler.name());
        let output = compiler.run(&tsconfig)?;
        let diagnostics = parse_diagnostics(&output.log, |printed| {
            let printed = printed.replace('\\', "/");
            let relative = Path::new(&printed)
                .strip_prefix(root)
                .map(slash_path)
                .unwrap_or_else(|_| printed.trim_start_matches("./").to_string());
            staged.get(&relative).cloned().unwrap_or_else(|| PathBuf::from(relative))
        });
        if !diagnostics.is_empty() {
            for diagnostic in &diagnostics {
                error!("{}", diagnostic);
            }
            return Err(DeclarationError::Diagnostics(diagnostics));
        }
        if !output.success {
            return Err(DeclarationError::CompilerFailed {
                program: compiler.name(),
                log: output.log,
            });
        }

        let out = root.join(OUT_DIR);
        let mut declarations = BTreeMap::new();
        for unit in &self.units {
            let emitted = out.join(declaration_path(&unit.id));
            match fs::read_to_string(&emitted) {
                Ok(text) => {
                    declarations.insert(unit.id.clone(), text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("compiler wrote nothing for {}", unit.id.display());
                }
                Err(source) => return Err(DeclarationError::Io { path: emitted, source }),
            }
        }
        Ok(declarations)
    }

    fn tsconfig(&self, files: &[&String]) -> Value {
        json!({
            "compilerOptions": {
                "target": "ES2020",
                "module": "ESNext",
                "moduleResolution": "node",
                "jsx": "preserve",
                "strict": true,
                "allowJs": true,
                "esModuleInterop": true,
                "resolveJsonModule": true,
                "skipLibCheck": true,
                "declaration": true,
                "emitDeclarationOnly": true,
                "noEmitOnError": true,
                "rootDir": ".",
                "outDir": format!("./{}", OUT_DIR),
                "baseUrl": ".",
                "rootDirs": [".", slash_path(&self.sources)],
                "paths": self.scope.paths(),
            },
            "files": files,
        })
    }
}

impl TypeProject<Checked> {
    /// One declaration file per unit under `out_dir`, with specifiers
    /// rewritten to public paths.
    pub fn emit(
        &self,
        out_dir: &Path,
        rewriter: &SpecifierRewriter,
    ) -> Result<Vec<EmittedFile>, DeclarationError> {
        self.units
            .iter()
            .map(|unit| {
                let text = self
                    .declarations
                    .get(&unit.id)
                    .filter(|text| !text.trim().is_empty())
                    .ok_or_else(|| DeclarationError::EmptyEmit { path: unit.logical.clone() })?;
                let path = out_dir.join(declaration_path(&unit.id));
                Ok(EmittedFile::new(path, rewriter.rewrite(text)))
            })
            .collect()
    }

    pub fn declaration(&self, id: &Path) -> Option<&str> {
        self.declarations.get(id).map(String::as_str)
    }
}

impl<State> TypeProject<State> {
    pub fn units(&self) -> &[DeclarationUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Staging root that is removed on drop.
struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    fn create(path: &Path) -> Result<Self, DeclarationError> {
        if path.exists() {
            fs::remove_dir_all(path)
                .map_err(|source| DeclarationError::Io { path: path.to_path_buf(), source })?;
        }
        fs::create_dir_all(path)
            .map_err(|source| DeclarationError::Io { path: path.to_path_buf(), source })?;
        Ok(Self { path: path.to_path_buf() })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            debug!("could not remove {}: {}", self.path.display(), e);
        }
    }
}

/// Where an environment unit is staged. Units inside the packages tree keep
/// their logical location so relative imports still reach them.
fn ambient_location(index: usize, id: &Path) -> PathBuf {
    let inside = id.is_relative() && id.components().all(|c| matches!(c, Component::Normal(_)));
    if inside {
        return id.to_path_buf();
    }
    let name = id.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    PathBuf::from(AMBIENT_DIR).join(format!("{}-{}", index, name))
}

fn write_staged(root: &Path, relative: &Path, content: &str) -> Result<(), DeclarationError> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| DeclarationError::Io { path: parent.to_path_buf(), source })?;
    }
    fs::write(&path, content).map_err(|source| DeclarationError::Io { path, source })
}

/// Output path of a unit's declaration file.
///
/// `a/b.ts` -> `a/b.d.ts`, `a/b.vue.ts` -> `a/b.vue.d.ts`, `a/b.mts` ->
/// `a/b.d.mts`.
pub fn declaration_path(id: &Path) -> PathBuf {
    match id.extension().and_then(|e| e.to_str()) {
        Some("mts") => id.with_extension("d.mts"),
        Some("cts") => id.with_extension("d.cts"),
        _ => id.with_extension("d.ts"),
    }
}
