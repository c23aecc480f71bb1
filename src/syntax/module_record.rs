//! Import/export records of a script.
//!
//! Every top-level statement of a parsed program is classified into an
//! [`Item`]. Anything that is not an import, an export or a declaration is
//! [`Item::Other`]; the builders never need more than this to rewrite
//! specifiers, convert module formats and hoist setup bindings. The record
//! owns its data, so it outlives the allocator the program was parsed into.

use std::ops::Range;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    self, Argument, BindingPattern, BindingPatternKind, CallExpression, ExportDefaultDeclarationKind,
    Expression, ImportDeclaration, ImportDeclarationSpecifier, ImportExpression, ModuleExportName,
    Program, Statement, StringLiteral, TSModuleDeclarationKind, TSModuleDeclarationName,
    VariableDeclaration, VariableDeclarationKind,
};
use oxc_ast::visit::walk;
use oxc_ast::Visit;
use oxc_span::{GetSpan, SourceType, Span};

use super::{parse, SyntaxError};

/// A quoted module specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    pub value: String,
    /// Byte range of the literal, quotes included
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub imported: String,
    pub local: String,
    pub type_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub source: Specifier,
    /// `import type ...`
    pub type_only: bool,
    pub default: Option<String>,
    pub namespace: Option<String>,
    pub named: Vec<ImportBinding>,
    /// `import 'x'`, imported for side effects only
    pub side_effect: bool,
}

impl ImportDecl {
    /// Local names this import binds at runtime, in source order.
    pub fn value_bindings(&self) -> Vec<&str> {
        if self.type_only {
            return Vec::new();
        }
        let mut names: Vec<&str> = Vec::new();
        names.extend(self.default.as_deref());
        names.extend(self.namespace.as_deref());
        names.extend(self.named.iter().filter(|b| !b.type_only).map(|b| b.local.as_str()));
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBinding {
    pub local: String,
    pub exported: String,
    pub type_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportFrom {
    /// `export * from 'x'` or `export * as ns from 'x'`
    All { source: Specifier, alias: Option<String> },
    /// `export { a, b as c } from 'x'`
    Named { source: Specifier, bindings: Vec<ExportBinding>, type_only: bool },
}

impl ExportFrom {
    pub fn source(&self) -> &Specifier {
        match self {
            ExportFrom::All { source, .. } | ExportFrom::Named { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Const,
    Let,
    Var,
    Function,
    Class,
    Enum,
    Interface,
    TypeAlias,
    Namespace,
    /// `declare module 'name' { ... }`
    AmbientModule,
    /// `declare global { ... }`
    Global,
}

impl DeclKind {
    /// Declarations that only exist in the type space.
    pub fn is_type_only(self) -> bool {
        matches!(self, DeclKind::Interface | DeclKind::TypeAlias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    /// Declared names; the module name for [`DeclKind::AmbientModule`]
    pub names: Vec<String>,
    /// Carries a `declare` modifier
    pub ambient: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultExport {
    Function { name: Option<String> },
    Class { name: Option<String> },
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Import(ImportDecl),
    ExportFrom(ExportFrom),
    /// `export { a, b as c }`
    ExportList { bindings: Vec<ExportBinding>, type_only: bool },
    /// `export <declaration>`; the declaration itself starts at `declaration_start`
    ExportDeclaration { decl: Declaration, declaration_start: usize },
    /// `export default <value>`; the value starts at `value_start`
    ExportDefault { kind: DefaultExport, value_start: usize },
    Declaration(Declaration),
    Other,
}

impl Item {
    /// Items with no runtime meaning.
    pub fn is_type_only(&self) -> bool {
        match self {
            Item::Import(import) => import.type_only,
            Item::ExportFrom(ExportFrom::Named { type_only, .. }) => *type_only,
            Item::ExportList { type_only, .. } => *type_only,
            Item::ExportDeclaration { decl, .. } | Item::Declaration(decl) => {
                decl.ambient
                    || decl.kind.is_type_only()
                    || matches!(decl.kind, DeclKind::AmbientModule | DeclKind::Global)
            }
            _ => false,
        }
    }
}

/// A top-level statement together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleItem {
    /// Byte range of the statement
    pub range: Range<usize>,
    pub item: Item,
}

/// `import('x')` with a literal specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicImport {
    /// Byte range of the whole `import(...)` expression
    pub range: Range<usize>,
    pub specifier: Specifier,
}

/// All items of a script plus its dynamic imports and `require('x')` calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleRecord {
    pub items: Vec<ModuleItem>,
    pub dynamic_imports: Vec<DynamicImport>,
    /// `require('x')` calls that are not method calls
    pub requires: Vec<Specifier>,
}

impl ModuleRecord {
    /// Parse `text` and record its surface.
    pub fn parse(text: &str, source_type: SourceType) -> Result<Self, SyntaxError> {
        let allocator = Allocator::default();
        let program = parse(&allocator, text, source_type)?;
        Ok(Self::from_program(&program))
    }

    /// Record the surface of an already parsed program. Items line up with
    /// `program.body`.
    pub fn from_program(program: &Program<'_>) -> Self {
        let items = program
            .body
            .iter()
            .map(|statement| ModuleItem { range: range(statement.span()), item: classify(statement) })
            .collect();
        let mut calls = CallCollector::default();
        calls.visit_program(program);
        Self { items, dynamic_imports: calls.dynamic_imports, requires: calls.requires }
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.items.iter().filter_map(|m| match &m.item {
            Item::Import(import) => Some(import),
            _ => None,
        })
    }

    /// Every static and dynamic specifier, in source order.
    pub fn specifiers(&self) -> Vec<&Specifier> {
        let mut all: Vec<&Specifier> = self
            .items
            .iter()
            .filter_map(|m| match &m.item {
                Item::Import(import) => Some(&import.source),
                Item::ExportFrom(from) => Some(from.source()),
                _ => None,
            })
            .chain(self.dynamic_imports.iter().map(|d| &d.specifier))
            .collect();
        all.sort_by_key(|s| s.range.start);
        all
    }

    /// Names exported by this module itself, excluding `export *` re-exports.
    ///
    /// Type-only exports are included when `with_types` is set.
    pub fn exported_names(&self, with_types: bool) -> Vec<String> {
        let mut names = Vec::new();
        for module_item in &self.items {
            match &module_item.item {
                Item::ExportDeclaration { decl, .. } => {
                    if with_types || !module_item.item.is_type_only() {
                        names.extend(decl.names.iter().cloned());
                    }
                }
                Item::ExportList { bindings, type_only }
                | Item::ExportFrom(ExportFrom::Named { bindings, type_only, .. }) => {
                    names.extend(
                        bindings
                            .iter()
                            .filter(|b| with_types || !(*type_only || b.type_only))
                            .map(|b| b.exported.clone()),
                    );
                }
                Item::ExportFrom(ExportFrom::All { alias: Some(alias), .. }) => {
                    names.push(alias.clone());
                }
                Item::ExportDefault { .. } => names.push("default".to_string()),
                _ => {}
            }
        }
        names
    }

    /// Sources of `export * from` statements.
    pub fn star_sources(&self) -> Vec<&Specifier> {
        self.items
            .iter()
            .filter_map(|m| match &m.item {
                Item::ExportFrom(ExportFrom::All { source, alias: None }) => Some(source),
                _ => None,
            })
            .collect()
    }

    pub fn has_default_export(&self) -> bool {
        self.exported_names(false).iter().any(|n| n == "default")
    }

    /// True when the script uses any import or export syntax.
    pub fn is_esm(&self) -> bool {
        self.items.iter().any(|m| !matches!(m.item, Item::Declaration(_) | Item::Other))
    }
}

fn range(span: Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

fn specifier(literal: &StringLiteral<'_>) -> Specifier {
    Specifier { value: literal.value.to_string(), range: range(literal.span) }
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(literal) => literal.value.to_string(),
    }
}

fn classify(statement: &Statement<'_>) -> Item {
    match statement {
        Statement::ImportDeclaration(import) => Item::Import(import_decl(import)),
        Statement::ExportAllDeclaration(export) => Item::ExportFrom(ExportFrom::All {
            source: specifier(&export.source),
            alias: export.exported.as_ref().map(export_name),
        }),
        Statement::ExportNamedDeclaration(export) => {
            if let Some(decl) = &export.declaration {
                return Item::ExportDeclaration {
                    decl: exported_declaration(decl),
                    declaration_start: decl.span().start as usize,
                };
            }
            let type_only = export.export_kind.is_type();
            let bindings = export
                .specifiers
                .iter()
                .map(|s| ExportBinding {
                    local: export_name(&s.local),
                    exported: export_name(&s.exported),
                    type_only: s.export_kind.is_type(),
                })
                .collect();
            match &export.source {
                Some(source) => {
                    Item::ExportFrom(ExportFrom::Named { source: specifier(source), bindings, type_only })
                }
                None => Item::ExportList { bindings, type_only },
            }
        }
        Statement::ExportDefaultDeclaration(export) => {
            let value_start = export.declaration.span().start as usize;
            let kind = match &export.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                    DefaultExport::Function { name: function.id.as_ref().map(|id| id.name.to_string()) }
                }
                ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                    DefaultExport::Class { name: class.id.as_ref().map(|id| id.name.to_string()) }
                }
                ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                    return Item::ExportDeclaration {
                        decl: Declaration {
                            kind: DeclKind::Interface,
                            names: vec!["default".to_string()],
                            ambient: false,
                        },
                        declaration_start: value_start,
                    };
                }
                _ => DefaultExport::Expression,
            };
            Item::ExportDefault { kind, value_start }
        }
        Statement::VariableDeclaration(var) => Item::Declaration(variable(var)),
        Statement::FunctionDeclaration(function) => Item::Declaration(Declaration {
            kind: DeclKind::Function,
            names: function.id.iter().map(|id| id.name.to_string()).collect(),
            ambient: function.declare,
        }),
        Statement::ClassDeclaration(class) => Item::Declaration(Declaration {
            kind: DeclKind::Class,
            names: class.id.iter().map(|id| id.name.to_string()).collect(),
            ambient: class.declare,
        }),
        Statement::TSTypeAliasDeclaration(alias) => Item::Declaration(Declaration {
            kind: DeclKind::TypeAlias,
            names: vec![alias.id.name.to_string()],
            ambient: alias.declare,
        }),
        Statement::TSInterfaceDeclaration(interface) => Item::Declaration(Declaration {
            kind: DeclKind::Interface,
            names: vec![interface.id.name.to_string()],
            ambient: interface.declare,
        }),
        Statement::TSEnumDeclaration(decl) => Item::Declaration(Declaration {
            kind: DeclKind::Enum,
            names: vec![decl.id.name.to_string()],
            ambient: decl.declare,
        }),
        Statement::TSModuleDeclaration(module) => Item::Declaration(namespace(module)),
        _ => Item::Other,
    }
}

fn exported_declaration(decl: &ast::Declaration<'_>) -> Declaration {
    match decl {
        ast::Declaration::VariableDeclaration(var) => variable(var),
        ast::Declaration::FunctionDeclaration(function) => Declaration {
            kind: DeclKind::Function,
            names: function.id.iter().map(|id| id.name.to_string()).collect(),
            ambient: function.declare,
        },
        ast::Declaration::ClassDeclaration(class) => Declaration {
            kind: DeclKind::Class,
            names: class.id.iter().map(|id| id.name.to_string()).collect(),
            ambient: class.declare,
        },
        ast::Declaration::TSTypeAliasDeclaration(alias) => Declaration {
            kind: DeclKind::TypeAlias,
            names: vec![alias.id.name.to_string()],
            ambient: alias.declare,
        },
        ast::Declaration::TSInterfaceDeclaration(interface) => Declaration {
            kind: DeclKind::Interface,
            names: vec![interface.id.name.to_string()],
            ambient: interface.declare,
        },
        ast::Declaration::TSEnumDeclaration(decl) => Declaration {
            kind: DeclKind::Enum,
            names: vec![decl.id.name.to_string()],
            ambient: decl.declare,
        },
        ast::Declaration::TSModuleDeclaration(module) => namespace(module),
        ast::Declaration::TSImportEqualsDeclaration(decl) => Declaration {
            kind: DeclKind::Const,
            names: vec![decl.id.name.to_string()],
            ambient: false,
        },
    }
}

fn variable(var: &VariableDeclaration<'_>) -> Declaration {
    let kind = match var.kind {
        VariableDeclarationKind::Var => DeclKind::Var,
        VariableDeclarationKind::Let => DeclKind::Let,
        _ => DeclKind::Const,
    };
    let mut names = Vec::new();
    for declarator in &var.declarations {
        binding_names(&declarator.id, &mut names);
    }
    Declaration { kind, names, ambient: var.declare }
}

fn namespace(module: &ast::TSModuleDeclaration<'_>) -> Declaration {
    let (kind, name) = match (&module.kind, &module.id) {
        (TSModuleDeclarationKind::Global, _) => (DeclKind::Global, "global".to_string()),
        (_, TSModuleDeclarationName::StringLiteral(literal)) => {
            (DeclKind::AmbientModule, literal.value.to_string())
        }
        (_, TSModuleDeclarationName::Identifier(ident)) => {
            (DeclKind::Namespace, ident.name.to_string())
        }
    };
    Declaration { kind, names: vec![name], ambient: module.declare }
}

/// Names bound by one binding pattern, in source order.
pub fn binding_names(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(ident) => names.push(ident.name.to_string()),
        BindingPatternKind::ObjectPattern(object) => {
            for property in &object.properties {
                binding_names(&property.value, names);
            }
            if let Some(rest) = &object.rest {
                binding_names(&rest.argument, names);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                binding_names(element, names);
            }
            if let Some(rest) = &array.rest {
                binding_names(&rest.argument, names);
            }
        }
        BindingPatternKind::AssignmentPattern(assignment) => binding_names(&assignment.left, names),
    }
}

fn import_decl(import: &ImportDeclaration<'_>) -> ImportDecl {
    let mut decl = ImportDecl {
        source: specifier(&import.source),
        type_only: import.import_kind.is_type(),
        default: None,
        namespace: None,
        named: Vec::new(),
        side_effect: import.specifiers.is_none(),
    };
    for binding in import.specifiers.iter().flatten() {
        match binding {
            ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                decl.default = Some(default.local.name.to_string());
            }
            ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                decl.namespace = Some(namespace.local.name.to_string());
            }
            ImportDeclarationSpecifier::ImportSpecifier(named) => decl.named.push(ImportBinding {
                imported: export_name(&named.imported),
                local: named.local.name.to_string(),
                type_only: named.import_kind.is_type(),
            }),
        }
    }
    decl
}

/// Collects `import('x')` and `require('x')` anywhere in the program.
#[derive(Default)]
struct CallCollector {
    dynamic_imports: Vec<DynamicImport>,
    requires: Vec<Specifier>,
}

impl<'a> Visit<'a> for CallCollector {
    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &it.source {
            self.dynamic_imports
                .push(DynamicImport { range: range(it.span), specifier: specifier(literal) });
        }
        walk::walk_import_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            if callee.name.as_str() == "require" && it.arguments.len() == 1 {
                if let Some(Argument::StringLiteral(literal)) = it.arguments.first() {
                    self.requires.push(specifier(literal));
                }
            }
        }
        walk::walk_call_expression(self, it);
    }
}
