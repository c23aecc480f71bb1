//! Minification of linked bundles.

use minify_js::{minify, Session, TopLevelMode};

use crate::build::target::ModuleFormat;

use super::{Chunk, CompileError};

/// Minify a linked bundle. Leading `/*! ... */` banners are dropped by the
/// minifier; callers re-add them. The result carries no map.
pub fn minify_chunk(name: &str, chunk: &Chunk, format: ModuleFormat) -> Result<Chunk, CompileError> {
    let mode = match format {
        ModuleFormat::Esm => TopLevelMode::Module,
        ModuleFormat::Cjs | ModuleFormat::Umd => TopLevelMode::Global,
    };
    let session = Session::new();
    let mut output = Vec::with_capacity(chunk.code.len() / 2);
    minify(&session, mode, chunk.code.as_bytes(), &mut output).map_err(|e| {
        CompileError::Minify { name: name.to_string(), message: format!("{:?}", e) }
    })?;
    let code = String::from_utf8(output)
        .map_err(|e| CompileError::Minify { name: name.to_string(), message: e.to_string() })?;
    Ok(Chunk { code, map: None })
}
