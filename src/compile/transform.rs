//! Per-unit compilation.
//!
//! A unit is first turned into plain ESM script text (component sections
//! merged, types erased, template attached), then its specifiers are linked
//! and, for the CommonJS targets, its import/export statements are converted
//! in place. Only type erasure reprints the code; it reports the source line
//! of every printed line, and the later passes keep lines where they are.

use std::path::Path;

use crate::build::target::ModuleFormat;
use crate::sfc::desugar::rebind_default_export;
use crate::sfc::{merge_scripts, ComponentFile};
use crate::syntax::{
    is_identifier, parse_script, source_type, DefaultExport, ExportFrom, ImportDecl, Item,
    ModuleRecord, Specifier, SyntaxError,
};

use super::edits::Edits;
use super::sourcemap::LineMap;
use super::strip::{strip_types, Stripped};
use super::{js_string, member_access, Chunk, CompileError, LinkMap, ModuleInfo, ModuleSource};

/// Binding a component's options object is assigned to before the template
/// is attached.
pub const COMPONENT_BINDING: &str = "__sfc__";

const DEFAULT_EXPORT_BINDING: &str = "__default_export__";

const IMPORT_DEFAULT_HELPER: &str = "function __importDefault(mod) { return mod && mod.__esModule ? mod : { default: mod }; }";

const EXPORT_STAR_HELPER: &str = "function __exportStar(mod, target) { Object.keys(mod).forEach(function (key) { if (key !== 'default' && !Object.prototype.hasOwnProperty.call(target, key)) Object.defineProperty(target, key, { enumerable: true, get: function () { return mod[key]; } }); }); }";

/// ESM script text of a unit, before linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub code: String,
    /// 0-based source line of each line of `code`
    pub lines: Vec<Option<u32>>,
}

impl Prepared {
    fn verbatim(code: String) -> Self {
        let lines = (0..line_count(&code) as u32).map(Some).collect();
        Self { code, lines }
    }
}

/// Number of lines in `text`; a trailing line break does not open a new line.
pub fn line_count(text: &str) -> usize {
    let breaks = text.matches('\n').count();
    if text.ends_with('\n') {
        breaks
    } else {
        breaks + 1
    }
}

fn is_typescript(lang: &str) -> bool {
    matches!(lang, "ts" | "tsx" | "mts" | "cts")
}

/// Parse a compiled unit's ESM (or plain CommonJS) text.
fn record_of(code: &str) -> Result<ModuleRecord, SyntaxError> {
    let allocator = oxc_allocator::Allocator::default();
    let program = parse_script(&allocator, code)?;
    Ok(ModuleRecord::from_program(&program))
}

fn erase_types(path: &Path, code: &str, lang: &str) -> Result<Stripped, CompileError> {
    strip_types(path, code, source_type(lang))
        .map_err(|source| CompileError::Types { path: path.to_path_buf(), source })
}

/// Turn a unit into ESM script text.
pub fn prepare(module: &ModuleSource) -> Result<Prepared, CompileError> {
    let ext = module.extension();
    match ext {
        "vue" => prepare_component(module),
        "json" => {
            serde_json::from_str::<serde_json::Value>(&module.text)
                .map_err(|source| CompileError::Json { path: module.path.clone(), source })?;
            Ok(Prepared::verbatim(format!("export default {};\n", module.text.trim_end())))
        }
        _ if is_typescript(ext) => {
            let Stripped { code, lines } = erase_types(&module.path, &module.text, ext)?;
            Ok(Prepared { code, lines })
        }
        _ => {
            // Parse once so syntax errors surface here rather than in a later pass.
            record_of(&module.text)
                .map_err(|source| CompileError::Syntax { path: module.path.clone(), source })?;
            Ok(Prepared::verbatim(module.text.clone()))
        }
    }
}

fn prepare_component(module: &ModuleSource) -> Result<Prepared, CompileError> {
    let path = || module.path.clone();
    let file = ComponentFile::parse(&module.text)
        .map_err(|source| CompileError::Component { path: path(), source })?;
    let first_line = file
        .script
        .iter()
        .chain(file.script_setup.iter())
        .map(|section| section.range.start)
        .min()
        .map(|offset| module.text[..offset].matches('\n').count() as u32)
        .unwrap_or(0);

    let merged =
        merge_scripts(&file).map_err(|source| CompileError::Desugar { path: path(), source })?;
    let (mut code, mut lines) = match merged {
        Some(merged) if is_typescript(&merged.lang) => {
            let Stripped { code, lines } = erase_types(&module.path, &merged.code, &merged.lang)?;
            (code, lines)
        }
        Some(merged) => {
            let lines = (0..line_count(&merged.code) as u32).map(Some).collect();
            (merged.code, lines)
        }
        None => (String::new(), Vec::new()),
    };
    for line in lines.iter_mut().flatten() {
        *line += first_line;
    }

    code = match rebind_default_export(&code, "js", COMPONENT_BINDING)
        .map_err(|source| CompileError::Syntax { path: path(), source })?
    {
        Some(rebound) => rebound,
        None => {
            if !code.is_empty() && !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(&format!("const {} = {{}};", COMPONENT_BINDING));
            code
        }
    };
    if !code.ends_with('\n') {
        code.push('\n');
    }
    if let Some(template) = &file.template {
        code.push_str(&format!(
            "{}.template = {};\n",
            COMPONENT_BINDING,
            js_string(template.content.trim())
        ));
    }
    code.push_str(&format!("export default {};\n", COMPONENT_BINDING));
    lines.resize(line_count(&code), None);
    Ok(Prepared { code, lines })
}

/// Import/export surface of a unit.
pub fn analyze(module: &ModuleSource) -> Result<ModuleInfo, CompileError> {
    let prepared = prepare(module)?;
    let record = record_of(&prepared.code)
        .map_err(|source| CompileError::Syntax { path: module.path.clone(), source })?;

    let mut specifiers: Vec<&Specifier> = record.specifiers();
    specifiers.extend(record.requires.iter());
    specifiers.sort_by_key(|s| s.range.start);

    let mut imports: Vec<String> = Vec::new();
    for specifier in specifiers {
        if !imports.contains(&specifier.value) {
            imports.push(specifier.value.clone());
        }
    }
    Ok(ModuleInfo {
        imports,
        exports: record.exported_names(false),
        star_exports: record.star_sources().into_iter().map(|s| s.value.clone()).collect(),
    })
}

/// Compile one unit for `format` with its specifiers replaced through `links`.
pub fn compile_module(
    module: &ModuleSource,
    links: &LinkMap,
    format: ModuleFormat,
) -> Result<Chunk, CompileError> {
    let prepared = prepare(module)?;
    let converted = match format {
        ModuleFormat::Esm => link_specifiers(&prepared.code, links).map(|code| (code, 0)),
        ModuleFormat::Cjs | ModuleFormat::Umd => to_commonjs(&prepared.code, links),
    };
    let (code, header_lines) = converted
        .map_err(|source| CompileError::Syntax { path: module.path.clone(), source })?;

    let mut map = LineMap::from_source_lines(module.path.to_string_lossy(), &prepared.lines);
    map.shift(header_lines);
    map.pad_to(line_count(&code));
    Ok(Chunk { code, map: Some(map) })
}

/// Replace every linked static and dynamic specifier, keeping ESM syntax.
pub fn link_specifiers(code: &str, links: &LinkMap) -> Result<String, SyntaxError> {
    let record = record_of(code)?;
    let mut edits = Edits::new();
    for specifier in record.specifiers() {
        if let Some(target) = links.get(&specifier.value) {
            if *target != specifier.value {
                edits.replace(specifier.range.clone(), js_string(target));
            }
        }
    }
    Ok(edits.apply(code))
}

#[derive(Default)]
struct CommonJs {
    edits: Edits,
    /// `(exported name, expression)` pairs exposed through getters
    exports: Vec<(String, String)>,
    temps: usize,
    import_default: bool,
    export_star: bool,
}

impl CommonJs {
    fn temp(&mut self, prefix: &str) -> String {
        let name = format!("__{}_{}", prefix, self.temps);
        self.temps += 1;
        name
    }

    fn import(&mut self, import: &ImportDecl, require: String) -> String {
        let named: Vec<String> = import
            .named
            .iter()
            .filter(|b| !b.type_only)
            .map(|b| {
                if b.imported == b.local {
                    b.local.clone()
                } else if is_identifier(&b.imported) {
                    format!("{}: {}", b.imported, b.local)
                } else {
                    format!("{}: {}", js_string(&b.imported), b.local)
                }
            })
            .collect();
        let forms = usize::from(import.default.is_some())
            + usize::from(import.namespace.is_some())
            + usize::from(!named.is_empty());

        if import.side_effect || forms == 0 {
            return format!("{};", require);
        }
        if forms > 1 {
            let temp = self.temp("import");
            let bindings = self.bindings(import, &named, &temp).unwrap_or_default();
            return format!("const {} = {}; {}", temp, require, bindings);
        }
        self.bindings(import, &named, &require).unwrap_or_default()
    }

    fn bindings(&mut self, import: &ImportDecl, named: &[String], source: &str) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(default) = &import.default {
            self.import_default = true;
            parts.push(format!("const {} = __importDefault({}).default;", default, source));
        }
        if let Some(namespace) = &import.namespace {
            parts.push(format!("const {} = {};", namespace, source));
        }
        if !named.is_empty() {
            parts.push(format!("const {{ {} }} = {};", named.join(", "), source));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    fn header(&self) -> String {
        let mut header = String::from(
            "'use strict';\nObject.defineProperty(exports, '__esModule', { value: true });\n",
        );
        for (name, expression) in &self.exports {
            header.push_str(&format!(
                "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});\n",
                js_string(name),
                expression
            ));
        }
        header
    }
}

/// Convert ESM import/export statements to CommonJS.
///
/// Returns the converted text and the number of header lines placed before
/// the first source line. Exports are exposed through getters defined up
/// front; re-exports of other modules read the required module object.
pub fn to_commonjs(code: &str, links: &LinkMap) -> Result<(String, usize), SyntaxError> {
    let record = record_of(code)?;
    let linked = |value: &str| js_string(links.get(value).map(String::as_str).unwrap_or(value));
    let mut cjs = CommonJs::default();

    for module_item in &record.items {
        let range = module_item.range.clone();
        match &module_item.item {
            Item::Import(import) => {
                let require = format!("require({})", linked(&import.source.value));
                let text = if import.type_only { String::new() } else { cjs.import(import, require) };
                cjs.edits.replace(range, text);
            }
            Item::ExportFrom(ExportFrom::All { source, alias: None }) => {
                cjs.export_star = true;
                cjs.edits.replace(
                    range,
                    format!("__exportStar(require({}), exports);", linked(&source.value)),
                );
            }
            Item::ExportFrom(ExportFrom::All { source, alias: Some(alias) }) => {
                let temp = cjs.temp("reexport");
                cjs.edits
                    .replace(range, format!("const {} = require({});", temp, linked(&source.value)));
                cjs.exports.push((alias.clone(), temp));
            }
            Item::ExportFrom(ExportFrom::Named { source, bindings, type_only }) => {
                let values: Vec<_> =
                    bindings.iter().filter(|b| !(*type_only || b.type_only)).collect();
                if values.is_empty() {
                    cjs.edits.remove(range);
                    continue;
                }
                let temp = cjs.temp("reexport");
                cjs.edits
                    .replace(range, format!("const {} = require({});", temp, linked(&source.value)));
                for binding in values {
                    cjs.exports.push((binding.exported.clone(), member_access(&temp, &binding.local)));
                }
            }
            Item::ExportList { bindings, type_only } => {
                cjs.edits.remove(range);
                for binding in bindings.iter().filter(|b| !(*type_only || b.type_only)) {
                    cjs.exports.push((binding.exported.clone(), binding.local.clone()));
                }
            }
            Item::ExportDeclaration { decl, declaration_start } => {
                cjs.edits.remove(range.start..*declaration_start);
                for name in &decl.names {
                    cjs.exports.push((name.clone(), name.clone()));
                }
            }
            Item::ExportDefault { kind, value_start } => match kind {
                DefaultExport::Function { name: Some(name) }
                | DefaultExport::Class { name: Some(name) } => {
                    cjs.edits.remove(range.start..*value_start);
                    cjs.exports.push(("default".to_string(), name.clone()));
                }
                _ => {
                    cjs.edits.replace(
                        range.start..*value_start,
                        format!("const {} = ", DEFAULT_EXPORT_BINDING),
                    );
                    cjs.exports.push(("default".to_string(), DEFAULT_EXPORT_BINDING.to_string()));
                }
            },
            Item::Declaration(_) | Item::Other => {}
        }
    }

    for import in &record.dynamic_imports {
        cjs.edits.replace(
            import.range.clone(),
            format!("Promise.resolve().then(() => require({}))", linked(&import.specifier.value)),
        );
    }

    for specifier in &record.requires {
        if let Some(target) = links.get(&specifier.value) {
            cjs.edits.replace(specifier.range.clone(), js_string(target));
        }
    }

    // Plain CommonJS sources keep their own semantics: no strict mode, no marker.
    let header = if record.is_esm() { cjs.header() } else { String::new() };
    let header_lines = if header.is_empty() { 0 } else { line_count(&header) };
    let import_default = cjs.import_default;
    let export_star = cjs.export_star;
    let mut out = header;
    out.push_str(&cjs.edits.apply(code));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    if import_default {
        out.push_str(IMPORT_DEFAULT_HELPER);
        out.push('\n');
    }
    if export_star {
        out.push_str(EXPORT_STAR_HELPER);
        out.push('\n');
    }
    Ok((out, header_lines))
}
