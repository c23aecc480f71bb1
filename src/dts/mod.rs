//! Declaration generation.
//!
//! Every public script and component is turned into a declaration unit,
//! the units are checked together as one project by the TypeScript
//! compiler, and only a clean check produces `.d.ts` output. A single
//! diagnostic fails the whole task before anything is written.

pub mod compiler;
pub mod extract;
pub mod project;

use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::build::discovery::{
    discover_declaration_units, slash_path, DiscoveryError, SourceUnit,
};
use crate::build::emit::{write_outputs, WriteError};
use crate::build::BuildContext;
use crate::resolve::SpecifierRewriter;
use crate::sfc::{DesugarError, SfcError};

pub use compiler::{parse_diagnostics, CompilerOutput, Tsc, TypeCompiler};
pub use extract::{extract, extract_unit, NO_CHECK_DIRECTIVE};
pub use project::{declaration_path, Checked, Open, ScopeMap, TypeProject};

/// Staging directory, under the output root, for the compiler run.
pub const STAGING_DIR: &str = ".kiln-types";

/// Source grammar of a declaration unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Ts,
    Tsx,
    Js,
    Jsx,
}

impl Grammar {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "mts" | "cts" => Some(Self::Ts),
            "tsx" => Some(Self::Tsx),
            "js" | "mjs" | "cjs" => Some(Self::Js),
            "jsx" => Some(Self::Jsx),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Ts => "ts",
            Self::Tsx => "tsx",
            Self::Js => "js",
            Self::Jsx => "jsx",
        }
    }
}

/// One in-memory unit of the type project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationUnit {
    /// Identity inside the project, e.g. `components/a/src/a.vue.ts`
    pub id: PathBuf,
    /// Path relative to the packages root
    pub logical: PathBuf,
    /// File the unit was read from
    pub source: PathBuf,
    pub grammar: Grammar,
    pub content: String,
}

impl DeclarationUnit {
    /// Read an existing declaration file as an ambient unit.
    pub fn ambient(id: PathBuf, source: PathBuf) -> Result<Self, DeclarationError> {
        let content = std::fs::read_to_string(&source)
            .map_err(|e| DeclarationError::Io { path: source.clone(), source: e })?;
        Ok(Self { logical: id.clone(), id, source, grammar: Grammar::Ts, content })
    }
}

/// A located type-check finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} - error: {}",
            slash_path(&self.path),
            self.line,
            self.column,
            self.message
        )
    }
}

fn list_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics.iter().map(|d| format!("\n  {}", d)).collect()
}

/// Errors from the declaration pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeclarationError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Component {
        path: PathBuf,
        #[source]
        source: SfcError,
    },

    #[error("{}: {source}", path.display())]
    Desugar {
        path: PathBuf,
        #[source]
        source: DesugarError,
    },

    #[error("no TypeScript compiler found (tried {tried} in node_modules/.bin and PATH)")]
    CompilerUnavailable { tried: String },

    #[error("failed to run {}: {source}", program.display())]
    CompilerSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed without diagnostics:\n{log}")]
    CompilerFailed { program: String, log: String },

    #[error("type check failed with {} error(s):{}", .0.len(), list_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),

    #[error("no declaration output for {}", path.display())]
    EmptyEmit { path: PathBuf },

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Runs discovery, extraction, the check and emission for one build.
pub struct DeclarationGenerator<'a> {
    ctx: &'a BuildContext,
}

impl<'a> DeclarationGenerator<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self { ctx }
    }

    /// Build the unchecked project from the workspace sources.
    pub fn project(&self) -> Result<TypeProject<Open>, DeclarationError> {
        let units = discover_declaration_units(self.ctx)?;
        let (existing, sources): (Vec<SourceUnit>, Vec<SourceUnit>) =
            units.into_iter().partition(|u| u.is_declaration_file());

        let scope = ScopeMap {
            scope: self.ctx.scope().to_string(),
            entry: self.ctx.config().project.entry.clone(),
        };
        let mut project = TypeProject::new(scope, self.ctx.packages_dir());

        if let Some(env) = &self.ctx.config().types.env {
            project.add_ambient(self.environment_unit(env)?);
        }
        let ambient: Vec<DeclarationUnit> = existing
            .par_iter()
            .map(|u| DeclarationUnit::ambient(u.logical.clone(), u.path.clone()))
            .collect::<Result<_, _>>()?;
        for unit in ambient {
            project.add_ambient(unit);
        }

        let derived: Vec<Option<DeclarationUnit>> =
            sources.par_iter().map(extract_unit).collect::<Result<_, _>>()?;
        project.register(derived.into_iter().flatten());
        Ok(project)
    }

    fn environment_unit(&self, env: &Path) -> Result<DeclarationUnit, DeclarationError> {
        let path = self.ctx.resolve_path(env);
        let id = path
            .strip_prefix(self.ctx.project_root())
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        DeclarationUnit::ambient(id, path)
    }

    /// Check the project with the workspace's compiler and write one
    /// declaration file per unit.
    pub fn generate(&self) -> Result<Vec<PathBuf>, DeclarationError> {
        let configured = self.ctx.config().types.compiler.as_deref();
        let compiler = Tsc::locate(self.ctx.project_root(), configured)?;
        self.generate_with(&compiler)
    }

    /// Like [`generate`](Self::generate) with an explicit compiler.
    ///
    /// Nothing is written unless the check is clean.
    pub fn generate_with(&self, compiler: &dyn TypeCompiler) -> Result<Vec<PathBuf>, DeclarationError> {
        let project = self.project()?;
        info!("checking {} declaration unit(s) with {}", project.len(), compiler.name());

        let staging = self.ctx.output_dir().join(STAGING_DIR);
        let checked = project.check(compiler, &staging)?;

        let rewriter = SpecifierRewriter::from_context(self.ctx);
        let files = checked.emit(&self.ctx.types_dir(), &rewriter)?;
        write_outputs(&files)?;
        info!("wrote {} declaration file(s)", files.len());
        Ok(files.into_iter().map(|f| f.path).collect())
    }
}

/// Generate declarations for the workspace described by `ctx`.
pub fn generate_declarations(ctx: &BuildContext) -> Result<Vec<PathBuf>, DeclarationError> {
    DeclarationGenerator::new(ctx).generate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grammar_from_extension() {
        assert_eq!(Grammar::from_extension("mts"), Some(Grammar::Ts));
        assert_eq!(Grammar::from_extension("jsx"), Some(Grammar::Jsx));
        assert_eq!(Grammar::from_extension("vue"), None);
        assert_eq!(Grammar::Tsx.extension(), "tsx");
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic {
            path: PathBuf::from("components/a/src/a.vue.ts"),
            line: 3,
            column: 7,
            message: "TS2307: Cannot find module './missing' or its corresponding type declarations.".to_string(),
        };
        assert_eq!(
            diagnostic.to_string(),
            "components/a/src/a.vue.ts:3:7 - error: TS2307: Cannot find module './missing' or its corresponding type declarations."
        );
    }

    #[test]
    fn test_diagnostics_error_lists_every_finding() {
        let d = |line| Diagnostic {
            path: PathBuf::from("a.ts"),
            line,
            column: 1,
            message: "TS2300: Duplicate identifier 'a'.".to_string(),
        };
        let message = DeclarationError::Diagnostics(vec![d(1), d(2)]).to_string();
        assert!(message.starts_with("type check failed with 2 error(s):"));
        assert!(message.contains("a.ts:2:1 - error"));
    }
}
