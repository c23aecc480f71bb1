//! Stylesheet compilation for the published style package.
//!
//! Every top-level `<name>.css` under the style source directory compiles to
//! `<prefix><name>.css` in the style output directory, except the shared
//! sheets listed as unprefixed. The sources are shipped next to the output
//! under `src/`.

use std::fs;
use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::build::discovery::{discover_files, DiscoveryError};
use crate::build::emit::{copy_file, copy_tree, write_outputs, EmittedFile, WriteError};
use crate::build::BuildContext;

/// Errors from the style tasks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ThemeError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {message}", path.display())]
    Css { path: PathBuf, message: String },

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Turns one stylesheet source into publishable CSS.
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, path: &Path, source: &str) -> Result<String, ThemeError>;
}

/// Parses plain CSS and prints it minified.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightningCompiler;

impl StyleCompiler for LightningCompiler {
    fn compile(&self, path: &Path, source: &str) -> Result<String, ThemeError> {
        let css_error = |message: String| ThemeError::Css { path: path.to_path_buf(), message };
        let options = ParserOptions {
            filename: path.to_string_lossy().into_owned(),
            ..ParserOptions::default()
        };
        let mut sheet = StyleSheet::parse(source, options).map_err(|e| css_error(e.to_string()))?;
        sheet.minify(MinifyOptions::default()).map_err(|e| css_error(e.to_string()))?;
        let printed = sheet
            .to_css(PrinterOptions { minify: true, ..PrinterOptions::default() })
            .map_err(|e| css_error(e.to_string()))?;
        Ok(printed.code)
    }
}

/// Builds the style package output.
pub struct ThemeBuilder<C: StyleCompiler = LightningCompiler> {
    source_dir: PathBuf,
    output_dir: PathBuf,
    prefix: String,
    unprefixed: Vec<String>,
    compiler: C,
}

impl ThemeBuilder<LightningCompiler> {
    pub fn from_context(ctx: &BuildContext) -> Self {
        let theme = &ctx.config().theme;
        Self::new(
            ctx.style_source_dir(),
            ctx.style_output_dir(),
            theme.prefix.clone(),
            theme.unprefixed.clone(),
            LightningCompiler,
        )
    }
}

impl<C: StyleCompiler> ThemeBuilder<C> {
    pub fn new(
        source_dir: PathBuf,
        output_dir: PathBuf,
        prefix: String,
        unprefixed: Vec<String>,
        compiler: C,
    ) -> Self {
        Self { source_dir, output_dir, prefix, unprefixed, compiler }
    }

    /// Published file name of the stylesheet `<name>.css`.
    pub fn output_name(&self, name: &str) -> String {
        if self.unprefixed.iter().any(|u| u == name) {
            format!("{}.css", name)
        } else {
            format!("{}{}.css", self.prefix, name)
        }
    }

    /// Compile every top-level stylesheet, then copy the sources.
    pub fn build(&self) -> Result<Vec<PathBuf>, ThemeError> {
        let sources = discover_files(&self.source_dir, "*", &["css".to_string()])?;
        let files: Vec<EmittedFile> = sources
            .par_iter()
            .map(|path| {
                let source = fs::read_to_string(path)
                    .map_err(|e| ThemeError::Io { path: path.clone(), source: e })?;
                let name = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
                let css = self.compiler.compile(path, &source)?;
                debug!("compiled {}", path.display());
                Ok(EmittedFile::new(self.output_dir.join(self.output_name(&name)), css))
            })
            .collect::<Result<_, ThemeError>>()?;

        let mut written = write_outputs(&files)?;
        written.extend(copy_tree(&self.source_dir, &self.output_dir.join("src"))?);
        info!("compiled {} stylesheet(s)", files.len());
        Ok(written)
    }
}

/// Build the style package configured for `ctx`.
pub fn build_theme(ctx: &BuildContext) -> Result<Vec<PathBuf>, ThemeError> {
    ThemeBuilder::from_context(ctx).build()
}

/// Copy the compiled full stylesheet next to the browser bundles.
pub fn copy_full_style(ctx: &BuildContext) -> Result<PathBuf, ThemeError> {
    let from = ctx.style_output_dir().join("index.css");
    let to = ctx.dist_dir().join("index.css");
    copy_file(&from, &to)?;
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Passthrough;

    impl StyleCompiler for Passthrough {
        fn compile(&self, _path: &Path, source: &str) -> Result<String, ThemeError> {
            Ok(source.to_string())
        }
    }

    fn builder(temp: &TempDir) -> ThemeBuilder<Passthrough> {
        ThemeBuilder::new(
            temp.path().join("src"),
            temp.path().join("out"),
            "el-".to_string(),
            vec!["index".to_string(), "base".to_string()],
            Passthrough,
        )
    }

    #[test]
    fn test_output_names() {
        let temp = TempDir::new().expect("should create temp dir");
        let builder = builder(&temp);
        assert_eq!(builder.output_name("button"), "el-button.css");
        assert_eq!(builder.output_name("index"), "index.css");
        assert_eq!(builder.output_name("base"), "base.css");
    }

    #[test]
    fn test_build_compiles_top_level_sheets_and_copies_sources() {
        let temp = TempDir::new().expect("should create temp dir");
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("mixins")).expect("should create dirs");
        fs::write(src.join("button.css"), ".el-button{color:red}").expect("should write");
        fs::write(src.join("index.css"), "@import './button.css';").expect("should write");
        fs::write(src.join("mixins/a.css"), ".a{}").expect("should write");

        builder(&temp).build().expect("should build");

        let out = temp.path().join("out");
        assert_eq!(
            fs::read_to_string(out.join("el-button.css")).expect("should read"),
            ".el-button{color:red}"
        );
        assert!(out.join("index.css").is_file());
        assert!(!out.join("el-a.css").exists());
        assert!(out.join("src/mixins/a.css").is_file());
    }

    #[test]
    fn test_lightning_compiler_minifies() {
        let css = LightningCompiler
            .compile(Path::new("a.css"), ".a {\n  color: #ff0000;\n}\n")
            .expect("should compile");
        assert_eq!(css, ".a{color:red}");
    }
}
