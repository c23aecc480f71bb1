//! Compiler backend shared by the bundlers.
//!
//! The bundlers resolve specifiers themselves and hand the backend a
//! [`LinkMap`] per unit; the backend only transforms text. [`ScriptCompiler`]
//! is the built-in implementation: type erasure with the oxc transformer,
//! module-format conversion over oxc module records, bundle linking through a
//! small CommonJS registry and minification with `minify-js`.

pub mod edits;
pub mod link;
pub mod minify;
pub mod sourcemap;
pub mod strip;
pub mod transform;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::build::target::ModuleFormat;
use crate::sfc::{DesugarError, SfcError};
use crate::syntax::{is_identifier, SyntaxError};

pub use sourcemap::LineMap;
pub use strip::{strip_types, StripError, Stripped};

/// Specifier as written in a unit -> specifier to emit.
pub type LinkMap = BTreeMap<String, String>;

/// Errors raised while compiling, linking or minifying.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Syntax { path: PathBuf, source: SyntaxError },

    #[error("{}: {source}", path.display())]
    Types { path: PathBuf, source: StripError },

    #[error("{}: {source}", path.display())]
    Component { path: PathBuf, source: SfcError },

    #[error("{}: {source}", path.display())]
    Desugar { path: PathBuf, source: DesugarError },

    #[error("{}: invalid JSON: {source}", path.display())]
    Json { path: PathBuf, source: serde_json::Error },

    #[error("failed to link bundle: {message}")]
    Link { message: String },

    #[error("failed to minify {name}: {message}")]
    Minify { name: String, message: String },
}

/// Source text of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub path: PathBuf,
    pub text: String,
}

impl ModuleSource {
    pub fn read(path: &Path) -> Result<Self, CompileError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| CompileError::Io { path: path.to_path_buf(), source })?;
        Ok(Self { path: path.to_path_buf(), text })
    }

    pub fn extension(&self) -> &str {
        self.path.extension().and_then(|e| e.to_str()).unwrap_or("")
    }
}

/// Import/export surface of a unit, after type erasure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Static and dynamic specifiers, deduplicated, in source order
    pub imports: Vec<String>,
    /// Value exports declared by the unit itself
    pub exports: Vec<String>,
    /// Sources of `export * from`
    pub star_exports: Vec<String>,
}

/// Compiled code with an optional line map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub code: String,
    pub map: Option<LineMap>,
}

/// A unit compiled to CommonJS, ready for the bundle registry.
#[derive(Debug, Clone)]
pub struct BundleModule {
    pub id: String,
    pub chunk: Chunk,
}

/// An unbundled dependency and the browser global standing in for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalGlobal {
    pub specifier: String,
    pub global: String,
}

/// What a bundle exposes from its entry module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleExports {
    /// Every named export, re-exported individually
    Named(Vec<String>),
    /// Only the default export, as the UMD global itself
    Default,
}

/// Everything needed to link one single-file bundle.
#[derive(Debug)]
pub struct BundleInput<'a> {
    /// `Umd` or `Esm`
    pub format: ModuleFormat,
    pub modules: &'a [BundleModule],
    /// Id of the entry module
    pub entry: &'a str,
    pub externals: &'a [ExternalGlobal],
    /// UMD global namespace
    pub global_name: &'a str,
    pub exports: BundleExports,
    pub banner: Option<&'a str>,
}

/// A compiler backend.
pub trait Compiler: Send + Sync {
    /// Import/export surface of a unit, used to resolve specifiers before compiling.
    fn analyze(&self, module: &ModuleSource) -> Result<ModuleInfo, CompileError>;

    /// Compile one unit to `format`, rewriting specifiers through `links`.
    fn compile(
        &self,
        module: &ModuleSource,
        links: &LinkMap,
        format: ModuleFormat,
    ) -> Result<Chunk, CompileError>;

    /// Link units compiled to CommonJS into one file.
    fn link(&self, bundle: &BundleInput<'_>) -> Result<Chunk, CompileError>;

    fn minify(&self, name: &str, chunk: &Chunk, format: ModuleFormat) -> Result<Chunk, CompileError>;
}

/// The built-in backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl Compiler for ScriptCompiler {
    fn analyze(&self, module: &ModuleSource) -> Result<ModuleInfo, CompileError> {
        transform::analyze(module)
    }

    fn compile(
        &self,
        module: &ModuleSource,
        links: &LinkMap,
        format: ModuleFormat,
    ) -> Result<Chunk, CompileError> {
        transform::compile_module(module, links, format)
    }

    fn link(&self, bundle: &BundleInput<'_>) -> Result<Chunk, CompileError> {
        link::link_bundle(bundle)
    }

    fn minify(&self, name: &str, chunk: &Chunk, format: ModuleFormat) -> Result<Chunk, CompileError> {
        minify::minify_chunk(name, chunk, format)
    }
}

/// A JavaScript string literal for `value`.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// `object.name`, or `object["name"]` when `name` is not an identifier.
pub(crate) fn member_access(object: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, js_string(name))
    }
}
