//! Script parsing shared by the bundlers, the component desugarer and the
//! declaration pipeline.
//!
//! Parsing is done by `oxc_parser`; this module only picks the source type
//! for a unit, turns parser diagnostics into a [`SyntaxError`] and lifts the
//! import/export surface out of the tree into an owned [`ModuleRecord`].

pub mod module_record;

use std::fmt;

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_parser::Parser;
use oxc_span::SourceType;

pub use module_record::{
    DeclKind, Declaration, DefaultExport, DynamicImport, ExportBinding, ExportFrom, ImportBinding,
    ImportDecl, Item, ModuleItem, ModuleRecord, Specifier,
};

/// Parser diagnostics of one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub messages: Vec<String>,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.messages.as_slice() {
            [] => write!(f, "invalid syntax"),
            [only] => write!(f, "{}", only),
            [first, rest @ ..] => write!(f, "{} (and {} more)", first, rest.len()),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// Source type for a script written in `lang` (`ts`, `tsx`, `js`, ...).
pub fn source_type(lang: &str) -> SourceType {
    match lang {
        "ts" | "mts" | "cts" => SourceType::ts(),
        "tsx" => SourceType::tsx(),
        "jsx" => SourceType::jsx(),
        "cjs" => SourceType::cjs(),
        _ => SourceType::mjs(),
    }
}

/// Parse `text`, failing on any parser diagnostic.
pub fn parse<'a>(
    allocator: &'a Allocator,
    text: &'a str,
    source_type: SourceType,
) -> Result<Program<'a>, SyntaxError> {
    let ret = Parser::new(allocator, text, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(SyntaxError { messages: ret.errors.iter().map(|e| e.to_string()).collect() });
    }
    Ok(ret.program)
}

/// Parse plain JavaScript as a module, falling back to a sloppy-mode script
/// for CommonJS files that are not valid module code.
pub fn parse_script<'a>(allocator: &'a Allocator, text: &'a str) -> Result<Program<'a>, SyntaxError> {
    match parse(allocator, text, SourceType::mjs()) {
        Ok(program) => Ok(program),
        Err(module_error) => parse(allocator, text, SourceType::cjs()).map_err(|_| module_error),
    }
}

/// Return true if `name` can be written as a plain JavaScript identifier.
pub fn is_identifier(name: &str) -> bool {
    oxc_syntax::identifier::is_identifier_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("ElButton"));
        assert!(is_identifier("$el"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_source_type_by_lang() {
        assert!(source_type("ts").is_typescript());
        assert!(source_type("tsx").is_jsx());
        assert!(!source_type("js").is_typescript());
        assert!(source_type("mjs").is_module());
    }

    #[test]
    fn test_parse_reports_diagnostics() {
        let allocator = Allocator::default();
        let err = parse(&allocator, "const = 1", SourceType::mjs()).expect_err("should fail");
        assert!(!err.messages.is_empty());
    }

    #[test]
    fn test_parse_script_accepts_sloppy_commonjs() {
        let allocator = Allocator::default();
        let program = parse_script(&allocator, "with (obj) { module.exports = a }\n")
            .expect("should fall back to script mode");
        assert_eq!(program.body.len(), 1);
    }
}
