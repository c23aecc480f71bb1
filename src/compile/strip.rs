//! TypeScript type erasure.
//!
//! The unit is parsed with `oxc_parser`, run through the TypeScript pass of
//! `oxc_transformer` (annotations, type-only imports and declarations removed,
//! enums and namespaces lowered) and printed back with `oxc_codegen`. The
//! printer's source map is folded into one source line per output line so
//! later line-preserving passes can keep mapping back to the original unit.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use thiserror::Error;

use crate::syntax::{parse, SyntaxError};

use super::transform::line_count;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StripError {
    #[error("{0}")]
    Syntax(#[from] SyntaxError),

    #[error("{}", .0.join("; "))]
    Transform(Vec<String>),
}

/// JavaScript produced from a TypeScript unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stripped {
    pub code: String,
    /// 0-based source line of each output line
    pub lines: Vec<Option<u32>>,
}

/// Erase the TypeScript syntax of a module. `path` only names the unit in
/// diagnostics and in the printer's source map.
pub fn strip_types(path: &Path, src: &str, source_type: SourceType) -> Result<Stripped, StripError> {
    let allocator = Allocator::default();
    let mut program = parse(&allocator, src, source_type)?;

    let semantic = SemanticBuilder::new().build(&program).semantic;
    let (symbols, scopes) = semantic.into_symbol_table_and_scope_tree();
    let options = TransformOptions::default();
    let transformed = Transformer::new(&allocator, path, &options)
        .build_with_symbols_and_scopes(symbols, scopes, &mut program);
    if !transformed.errors.is_empty() {
        return Err(StripError::Transform(
            transformed.errors.iter().map(|e| e.to_string()).collect(),
        ));
    }

    let printed = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: Some(path.to_path_buf()),
            ..CodegenOptions::default()
        })
        .build(&program);

    let mut lines = vec![None; line_count(&printed.code)];
    if let Some(map) = &printed.map {
        for token in map.get_tokens() {
            if let Some(line) = lines.get_mut(token.get_dst_line() as usize) {
                if line.is_none() {
                    *line = Some(token.get_src_line());
                }
            }
        }
    }
    Ok(Stripped { code: printed.code, lines })
}
