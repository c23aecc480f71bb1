//! The external TypeScript compiler.
//!
//! The project is staged as real files next to a generated `tsconfig.json`
//! and handed to `vue-tsc` or `tsc`, which checks every unit and emits the
//! declarations in the same run. `noEmitOnError` keeps a failing check from
//! producing output.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{DeclarationError, Diagnostic};

/// Executables tried, in order, when no compiler is configured.
pub const COMPILER_CANDIDATES: &[&str] = &["vue-tsc", "tsc"];

/// What one compiler run printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOutput {
    pub success: bool,
    /// stdout followed by stderr
    pub log: String,
}

/// A program that checks a staged project and writes its declarations to
/// the project's `outDir`.
pub trait TypeCompiler: Send + Sync {
    fn name(&self) -> String;

    fn run(&self, tsconfig: &Path) -> Result<CompilerOutput, DeclarationError>;
}

/// A `tsc`-compatible command line compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tsc {
    program: PathBuf,
}

impl Tsc {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    /// Find the compiler for the workspace at `root`: the configured
    /// program, then `node_modules/.bin`, then `PATH`.
    pub fn locate(root: &Path, configured: Option<&Path>) -> Result<Self, DeclarationError> {
        if let Some(program) = configured {
            // A bare name is looked up on PATH by the OS
            let program = if program.components().count() > 1 && program.is_relative() {
                root.join(program)
            } else {
                program.to_path_buf()
            };
            return Ok(Self::new(program));
        }

        let bin = root.join("node_modules").join(".bin");
        if let Some(local) = COMPILER_CANDIDATES.iter().map(|c| bin.join(c)).find(|p| p.is_file()) {
            return Ok(Self::new(local));
        }
        COMPILER_CANDIDATES
            .iter()
            .find_map(|candidate| which::which(candidate).ok())
            .map(Self::new)
            .ok_or_else(|| DeclarationError::CompilerUnavailable {
                tried: COMPILER_CANDIDATES.join(", "),
            })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl TypeCompiler for Tsc {
    fn name(&self) -> String {
        self.program.display().to_string()
    }

    fn run(&self, tsconfig: &Path) -> Result<CompilerOutput, DeclarationError> {
        let dir = tsconfig.parent().unwrap_or(Path::new("."));
        debug!("running {} -p {}", self.program.display(), tsconfig.display());
        let output = Command::new(&self.program)
            .arg("-p")
            .arg(tsconfig)
            .args(["--pretty", "false"])
            .current_dir(dir)
            .output()
            .map_err(|source| DeclarationError::CompilerSpawn {
                program: self.program.clone(),
                source,
            })?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(CompilerOutput { success: output.status.success(), log })
    }
}

static LOCATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)\((\d+),(\d+)\): error (TS\d+): (.*)$")
        .unwrap_or_else(|e| panic!("BUG: invalid diagnostic regex: {}", e))
});

static GLOBAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^error (TS\d+): (.*)$")
        .unwrap_or_else(|e| panic!("BUG: invalid diagnostic regex: {}", e))
});

/// Parse the `--pretty false` log of a compiler run.
///
/// `path(line,col): error TSnnnn: message` lines become located diagnostics;
/// indented lines that follow elaborate the previous message. Paths are
/// mapped back through `identify`, which turns a printed path into a unit id.
pub fn parse_diagnostics(log: &str, identify: impl Fn(&str) -> PathBuf) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    for line in log.lines() {
        if let Some(caps) = LOCATED.captures(line) {
            diagnostics.push(Diagnostic {
                path: identify(&caps[1]),
                line: caps[2].parse().unwrap_or(0),
                column: caps[3].parse().unwrap_or(0),
                message: format!("{}: {}", &caps[4], &caps[5]),
            });
        } else if let Some(caps) = GLOBAL.captures(line) {
            diagnostics.push(Diagnostic {
                path: PathBuf::from("tsconfig.json"),
                line: 0,
                column: 0,
                message: format!("{}: {}", &caps[1], &caps[2]),
            });
        } else if line.starts_with(' ') && !line.trim().is_empty() {
            if let Some(last) = diagnostics.last_mut() {
                last.message.push(' ');
                last.message.push_str(line.trim());
            }
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_located_diagnostics() {
        let log = "components/a/src/a.vue.ts(3,7): error TS2322: Type 'string' is not assignable to type 'number'.\n\
                   utils/index.ts(1,21): error TS2307: Cannot find module './missing' or its corresponding type declarations.\n";
        let diagnostics = parse_diagnostics(log, |p| PathBuf::from(p));
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].path, PathBuf::from("components/a/src/a.vue.ts"));
        assert_eq!((diagnostics[0].line, diagnostics[0].column), (3, 7));
        assert_eq!(
            diagnostics[0].message,
            "TS2322: Type 'string' is not assignable to type 'number'."
        );
        assert!(diagnostics[1].message.starts_with("TS2307: Cannot find module './missing'"));
    }

    #[test]
    fn test_elaboration_lines_join_previous_message() {
        let log = "a.ts(2,1): error TS2741: Property 'size' is missing in type '{}'.\n  'size' is declared here.\n\nFound 1 error.\n";
        let diagnostics = parse_diagnostics(log, |p| PathBuf::from(p));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.ends_with("in type '{}'. 'size' is declared here."));
    }

    #[test]
    fn test_global_diagnostics_point_at_config() {
        let diagnostics =
            parse_diagnostics("error TS5058: The specified path does not exist: 'x'.\n", |p| PathBuf::from(p));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].path, PathBuf::from("tsconfig.json"));
        assert!(diagnostics[0].message.starts_with("TS5058"));
    }

    #[test]
    fn test_paths_are_mapped_to_unit_ids() {
        let log = "components/a/src/a.vue.ts(1,1): error TS1005: ';' expected.\n";
        let diagnostics = parse_diagnostics(log, |printed| {
            PathBuf::from(printed.strip_suffix(".ts").unwrap_or(printed))
        });
        assert_eq!(diagnostics[0].path, PathBuf::from("components/a/src/a.vue"));
    }

    #[test]
    fn test_clean_log_has_no_diagnostics() {
        assert!(parse_diagnostics("", |p| PathBuf::from(p)).is_empty());
        assert!(parse_diagnostics("Version 5.4.5\n", |p| PathBuf::from(p)).is_empty());
    }

    #[test]
    fn test_locate_prefers_workspace_bin() {
        let temp = TempDir::new().expect("should create temp dir");
        let bin = temp.path().join("node_modules/.bin");
        fs::create_dir_all(&bin).expect("should create bin dir");
        fs::write(bin.join("tsc"), "").expect("should write tsc");
        let tsc = Tsc::locate(temp.path(), None).expect("should find the local compiler");
        assert_eq!(tsc.program(), bin.join("tsc"));

        fs::write(bin.join("vue-tsc"), "").expect("should write vue-tsc");
        let tsc = Tsc::locate(temp.path(), None).expect("should find the local compiler");
        assert_eq!(tsc.program(), bin.join("vue-tsc"));
    }

    #[test]
    fn test_locate_uses_configured_program() {
        let root = Path::new("/work");
        let tsc = Tsc::locate(root, Some(Path::new("tools/tsc"))).expect("should accept config");
        assert_eq!(tsc.program(), Path::new("/work/tools/tsc"));
        let tsc = Tsc::locate(root, Some(Path::new("tsc"))).expect("should accept config");
        assert_eq!(tsc.program(), Path::new("tsc"));
    }
}
