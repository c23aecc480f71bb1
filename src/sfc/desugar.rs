//! Macro-sugar desugaring for `<script setup>` sections.
//!
//! The setup section is rewritten into a plain module whose default export is
//! a component options object with a `setup` function:
//!
//! ```text
//! import { ref } from 'vue'
//!
//! export default {
//!   ...({ name: 'ElDemo' }),
//!   props: demoProps,
//!   setup(__props, { expose: __expose, emit: __emit }) {
//!     const props = __props
//!     const count = ref(0)
//!     const __returned__ = { ref, props, count }
//!     return __returned__
//!   },
//! }
//! ```
//!
//! Imports and type-only declarations are hoisted to module level, every
//! other statement moves into `setup` verbatim. The macros `defineProps`,
//! `withDefaults`, `defineEmits`, `defineExpose` and `defineOptions` are
//! replaced by references to the setup parameters and by component options.

use std::ops::Range;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, AwaitExpression, Expression, ForOfStatement, Function, Statement,
};
use oxc_ast::visit::walk;
use oxc_ast::Visit;
use oxc_span::{GetSpan, Span};
use oxc_syntax::scope::ScopeFlags;
use thiserror::Error;

use super::ComponentFile;
use crate::syntax::{parse, source_type, Item, ModuleRecord, SyntaxError};

/// Binding the plain section's default export is rebound to when a setup
/// section is merged into the same module.
pub const PLAIN_DEFAULT_BINDING: &str = "__default__";

const MACROS: &[&str] =
    &["defineProps", "withDefaults", "defineEmits", "defineExpose", "defineOptions"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DesugarError {
    #[error("{0}")]
    Syntax(#[from] SyntaxError),

    #[error("`{name}` is called more than once (offset {offset})")]
    DuplicateMacro { name: String, offset: usize },

    #[error("`{name}` expects {expected} (offset {offset})")]
    MacroArguments { name: String, expected: &'static str, offset: usize },

    #[error("<script setup> cannot contain value exports (offset {offset})")]
    ValueExport { offset: usize },
}

/// Script content of a component file after merging its script sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedScript {
    pub code: String,
    /// `lang` of the script sections
    pub lang: String,
}

/// Merge the plain and setup sections of a component into one module.
///
/// Returns `None` when the component has no script section at all.
pub fn merge_scripts(file: &ComponentFile) -> Result<Option<MergedScript>, DesugarError> {
    let lang = file.script_lang().to_string();
    let code = match (&file.script, &file.script_setup) {
        (None, None) => return Ok(None),
        (Some(plain), None) => plain.content.clone(),
        (None, Some(setup)) => desugar_setup(&setup.content, &lang, None)?,
        (Some(plain), Some(setup)) => {
            let (plain_code, base) =
                match rebind_default_export(&plain.content, &lang, PLAIN_DEFAULT_BINDING)? {
                    Some(rebound) => (rebound, Some(PLAIN_DEFAULT_BINDING)),
                    None => (plain.content.clone(), None),
                };
            let setup_code = desugar_setup(&setup.content, &lang, base)?;
            let mut code = plain_code;
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(&setup_code);
            code
        }
    };
    Ok(Some(MergedScript { code, lang }))
}

/// Replace `export default <value>` with `const <binding> = <value>`.
///
/// Returns `None` when the script has no default export statement.
pub fn rebind_default_export(
    code: &str,
    lang: &str,
    binding: &str,
) -> Result<Option<String>, SyntaxError> {
    let record = ModuleRecord::parse(code, source_type(lang))?;
    let found = record.items.iter().find_map(|m| match &m.item {
        Item::ExportDefault { value_start, .. } => Some((m.range.start, *value_start)),
        _ => None,
    });
    Ok(found.map(|(start, value_start)| {
        format!("{}const {} = {}", &code[..start], binding, &code[value_start..])
    }))
}

/// Collected component options and macro rewrites of one setup section.
#[derive(Default)]
struct Macros {
    options: Vec<String>,
    props: Option<String>,
    emits: Option<String>,
    seen: Vec<&'static str>,
}

impl Macros {
    fn record(&mut self, call: &MacroCall) -> Result<(), DesugarError> {
        let name = call.name;
        if name != "defineExpose" && self.seen.contains(&name) {
            return Err(DesugarError::DuplicateMacro {
                name: name.to_string(),
                offset: call.range.start,
            });
        }
        self.seen.push(name);
        Ok(())
    }
}

struct MacroCall {
    name: &'static str,
    /// Byte range of the whole call expression
    range: Range<usize>,
    type_args: Option<String>,
    args: Vec<String>,
    /// The call's first argument, when that is itself a macro call
    inner: Option<Box<MacroCall>>,
}

fn range(span: Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

/// Desugar a setup section into the exported-factory form.
///
/// With `base` set, the factory is merged into that binding through
/// `Object.assign` instead of being exported as a fresh object.
pub fn desugar_setup(source: &str, lang: &str, base: Option<&str>) -> Result<String, DesugarError> {
    let allocator = Allocator::default();
    let program = parse(&allocator, source, source_type(lang))?;
    let record = ModuleRecord::from_program(&program);
    let typed = matches!(lang, "ts" | "tsx");

    let mut hoisted: Vec<String> = Vec::new();
    let mut body: Vec<String> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();
    let mut macros = Macros::default();
    let mut has_await = false;
    let mut previous_end = 0;

    for (statement, module_item) in program.body.iter().zip(&record.items) {
        let statement_range = module_item.range.clone();
        let trivia = &source[previous_end..statement_range.start];
        previous_end = statement_range.end;
        let text = &source[statement_range.clone()];

        match &module_item.item {
            Item::Import(import) => {
                bindings.extend(import.value_bindings().into_iter().map(str::to_string));
                hoisted.push(format!("{}{}", trivia, text));
                continue;
            }
            item if item.is_type_only() => {
                hoisted.push(format!("{}{}", trivia, text));
                continue;
            }
            Item::ExportDeclaration { .. }
            | Item::ExportDefault { .. }
            | Item::ExportList { .. }
            | Item::ExportFrom(_) => {
                return Err(DesugarError::ValueExport { offset: statement_range.start });
            }
            Item::Declaration(decl) => bindings.extend(decl.names.iter().cloned()),
            Item::Other => {}
        }

        let mut awaits = TopLevelAwait::default();
        awaits.visit_statement(statement);
        has_await |= awaits.found;

        let rewritten = rewrite_macros(source, statement, typed, &mut macros)?;
        match rewritten {
            Some(code) if code.trim().is_empty() => {}
            Some(code) => body.push(format!("{}{}", trivia, code)),
            None => body.push(format!("{}{}", trivia, text)),
        }
    }

    let mut out = String::new();
    for statement in &hoisted {
        out.push_str(statement.trim_start_matches(['\r', '\n']));
        out.push('\n');
    }
    if !hoisted.is_empty() {
        out.push('\n');
    }

    match base {
        Some(base) => out.push_str(&format!("export default Object.assign({}, {{\n", base)),
        None => out.push_str("export default {\n"),
    }
    for option in &macros.options {
        out.push_str(&format!("  ...({}),\n", option));
    }
    if let Some(props) = &macros.props {
        out.push_str(&format!("  props: {},\n", props));
    }
    if let Some(emits) = &macros.emits {
        out.push_str(&format!("  emits: {},\n", emits));
    }
    let (props_type, context_type) = if typed { (": any", ": any") } else { ("", "") };
    out.push_str(&format!(
        "  {}setup(__props{}, {{ expose: __expose, emit: __emit }}{}) {{",
        if has_await { "async " } else { "" },
        props_type,
        context_type
    ));
    for statement in &body {
        if !statement.starts_with('\n') {
            out.push('\n');
        }
        out.push_str(statement);
    }
    out.push_str(&format!("\nconst __returned__ = {{ {} }}\n", bindings.join(", ")));
    out.push_str("return __returned__\n  },\n");
    match base {
        Some(_) => out.push_str("})\n"),
        None => out.push_str("}\n"),
    }
    Ok(out)
}

/// Rewrite a statement that is, or is initialised by, a macro call.
///
/// Returns `None` when the statement does not involve a macro.
fn rewrite_macros(
    source: &str,
    statement: &Statement<'_>,
    typed: bool,
    macros: &mut Macros,
) -> Result<Option<String>, DesugarError> {
    match statement {
        // `defineExpose({ ... })` and friends as expression statements
        Statement::ExpressionStatement(expression) => {
            let Some(call) = macro_call(source, &expression.expression) else {
                return Ok(None);
            };
            macros.record(&call)?;
            let replacement = apply_macro(&call, typed, macros)?;
            let kept = if call.name == "defineExpose" { replacement } else { String::new() };
            Ok(Some(kept))
        }
        // `const props = defineProps(...)`
        Statement::VariableDeclaration(var) => {
            if var.declarations.len() != 1 {
                return Ok(None);
            }
            let Some(init) = var.declarations.first().and_then(|d| d.init.as_ref()) else {
                return Ok(None);
            };
            let Some(call) = macro_call(source, init) else {
                return Ok(None);
            };
            macros.record(&call)?;
            let replacement = apply_macro(&call, typed, macros)?;
            let statement_range = range(var.span);
            Ok(Some(format!(
                "{}{}{}",
                &source[statement_range.start..call.range.start],
                replacement,
                &source[call.range.end..statement_range.end]
            )))
        }
        _ => Ok(None),
    }
}

/// Record the options a macro contributes and return its replacement expression.
fn apply_macro(call: &MacroCall, typed: bool, macros: &mut Macros) -> Result<String, DesugarError> {
    let cast = |target: &str, ty: &Option<String>| match ty {
        Some(ty) if typed => format!("({} as {})", target, ty),
        _ => target.to_string(),
    };
    let arguments = |expected: &'static str| DesugarError::MacroArguments {
        name: call.name.to_string(),
        expected,
        offset: call.range.start,
    };

    Ok(match call.name {
        "defineProps" => {
            macros.props = call.args.first().cloned();
            cast("__props", &call.type_args)
        }
        "withDefaults" => {
            let (Some(inner), [_, defaults]) = (&call.inner, call.args.as_slice()) else {
                return Err(arguments("`defineProps(...)` and a defaults object"));
            };
            if inner.name != "defineProps" {
                return Err(arguments("`defineProps(...)` and a defaults object"));
            }
            macros.seen.push("defineProps");
            macros.props = Some(match inner.args.first() {
                Some(runtime) => runtime.clone(),
                None => format!(
                    "Object.fromEntries(Object.entries({}).map(([key, value]) => [key, {{ default: value }}]))",
                    defaults
                ),
            });
            cast("__props", &inner.type_args)
        }
        "defineEmits" => {
            macros.emits = call.args.first().cloned();
            cast("__emit", &call.type_args)
        }
        "defineExpose" => format!("__expose({})", call.args.join(", ")),
        _ => {
            let [options] = call.args.as_slice() else {
                return Err(arguments("a single options object"));
            };
            macros.options.push(options.clone());
            "undefined".to_string()
        }
    })
}

/// `name<T>(args)` when `expression` is a call of a macro.
fn macro_call(source: &str, expression: &Expression<'_>) -> Option<MacroCall> {
    let Expression::CallExpression(call) = expression else {
        return None;
    };
    let Expression::Identifier(callee) = &call.callee else {
        return None;
    };
    let name = MACROS.iter().copied().find(|m| callee.name.as_str() == *m)?;

    let type_args = call.type_parameters.as_ref().map(|params| {
        let text = &source[range(params.span)];
        text.trim_start_matches('<').trim_end_matches('>').trim().to_string()
    });
    let args = call.arguments.iter().map(|arg| source[range(arg.span())].to_string()).collect();
    let inner = call
        .arguments
        .first()
        .and_then(|arg| arg.as_expression())
        .and_then(|arg| macro_call(source, arg))
        .map(Box::new);

    Some(MacroCall { name, range: range(call.span), type_args, args, inner })
}

/// Finds an `await` that is not nested inside any function body.
#[derive(Default)]
struct TopLevelAwait {
    found: bool,
}

impl<'a> Visit<'a> for TopLevelAwait {
    fn visit_await_expression(&mut self, it: &AwaitExpression<'a>) {
        self.found = true;
        walk::walk_await_expression(self, it);
    }

    fn visit_for_of_statement(&mut self, it: &ForOfStatement<'a>) {
        self.found |= it.r#await;
        walk::walk_for_of_statement(self, it);
    }

    fn visit_function(&mut self, _it: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _it: &ArrowFunctionExpression<'a>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETUP: &str = r#"
import { computed, ref } from 'vue'
import type { ButtonType } from './button'
import { buttonProps, buttonEmits } from './button'

defineOptions({ name: 'ElButton' })

const props = defineProps(buttonProps)
const emit = defineEmits(buttonEmits)
const count = ref(0)
const kind = computed<ButtonType>(() => props.type)

function handleClick(evt: MouseEvent) {
  emit('click', evt)
}

defineExpose({ count })
"#;

    #[test]
    fn test_desugar_canonical_form() {
        let out = desugar_setup(SETUP, "ts", None).unwrap();
        assert!(out.starts_with("import { computed, ref } from 'vue'\n"));
        assert!(out.contains("export default {\n  ...({ name: 'ElButton' }),\n"));
        assert!(out.contains("  props: buttonProps,\n  emits: buttonEmits,\n"));
        assert!(out.contains("setup(__props: any, { expose: __expose, emit: __emit }: any) {"));
        assert!(out.contains("const props = __props\n"));
        assert!(out.contains("const emit = __emit\n"));
        assert!(out.contains("__expose({ count })"));
        assert!(!out.contains("defineOptions"));
        assert!(!out.contains("defineProps"));
    }

    #[test]
    fn test_returned_bindings_in_declaration_order() {
        let out = desugar_setup(SETUP, "ts", None).unwrap();
        assert!(out.contains(
            "const __returned__ = { computed, ref, buttonProps, buttonEmits, props, emit, count, kind, handleClick }"
        ));
        assert!(!out.contains("__returned__ = { computed, ref, ButtonType"));
    }

    #[test]
    fn test_type_imports_hoisted() {
        let out = desugar_setup(SETUP, "ts", None).unwrap();
        let export_at = out.find("export default").unwrap();
        let type_import_at = out.find("import type { ButtonType }").unwrap();
        assert!(type_import_at < export_at);
    }

    #[test]
    fn test_deterministic() {
        let first = desugar_setup(SETUP, "ts", None).unwrap();
        let second = desugar_setup(SETUP, "ts", None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_js_setup_has_no_annotations() {
        let out = desugar_setup("const a = 1\n", "js", None).unwrap();
        assert!(out.contains("setup(__props, { expose: __expose, emit: __emit }) {"));
        assert!(out.contains("const __returned__ = { a }"));
    }

    #[test]
    fn test_type_argument_props() {
        let src = "const props = withDefaults(defineProps<{ size?: string }>(), { size: 'md' })\n";
        let out = desugar_setup(src, "ts", None).unwrap();
        assert!(out.contains("const props = (__props as { size?: string })"));
        assert!(out.contains("props: Object.fromEntries(Object.entries({ size: 'md' })"));
    }

    #[test]
    fn test_type_argument_emits() {
        let src = "const emit = defineEmits<{ (e: 'change', v: number): void }>()\n";
        let out = desugar_setup(src, "ts", None).unwrap();
        assert!(out.contains("const emit = (__emit as { (e: 'change', v: number): void })"));
        assert!(!out.contains("emits:"));
    }

    #[test]
    fn test_top_level_await_makes_setup_async() {
        let out = desugar_setup("const data = await load()\n", "js", None).unwrap();
        assert!(out.contains("async setup(__props"));

        let out = desugar_setup("for await (const chunk of stream) {}\n", "js", None).unwrap();
        assert!(out.contains("async setup(__props"));
    }

    #[test]
    fn test_await_inside_callbacks_keeps_setup_sync() {
        let src = "const doubled = list.map(async x => await x)\nconst handler = async function () { await save() }\n";
        let out = desugar_setup(src, "js", None).unwrap();
        assert!(out.contains("  setup(__props"));
        assert!(!out.contains("async setup"));

        let src = "const all = await Promise.all(list.map(async (x) => await x))\n";
        let out = desugar_setup(src, "js", None).unwrap();
        assert!(out.contains("async setup(__props"));
    }

    #[test]
    fn test_duplicate_macro_rejected() {
        let src = "defineProps({})\ndefineProps({})\n";
        assert!(matches!(
            desugar_setup(src, "js", None),
            Err(DesugarError::DuplicateMacro { .. })
        ));
    }

    #[test]
    fn test_value_export_rejected() {
        assert!(matches!(
            desugar_setup("export const a = 1\n", "js", None),
            Err(DesugarError::ValueExport { .. })
        ));
        assert!(desugar_setup("export interface A { a: string }\n", "ts", None).is_ok());
    }

    #[test]
    fn test_merge_rebinds_plain_default() {
        let source = "<script lang=\"ts\">\nexport default { inheritAttrs: false }\n</script>\n\
                      <script lang=\"ts\" setup>\nconst a = 1\n</script>\n";
        let file = ComponentFile::parse(source).unwrap();
        let merged = merge_scripts(&file).unwrap().unwrap();
        assert_eq!(merged.lang, "ts");
        assert!(merged.code.contains("const __default__ = { inheritAttrs: false }"));
        assert!(merged.code.contains("export default Object.assign(__default__, {"));
        assert_eq!(merged.code.matches("export default").count(), 1);
    }

    #[test]
    fn test_merge_plain_only_is_verbatim() {
        let source = "<script>\nexport const a = 1\n</script>";
        let file = ComponentFile::parse(source).unwrap();
        let merged = merge_scripts(&file).unwrap().unwrap();
        assert_eq!(merged.code, "\nexport const a = 1\n");
    }

    #[test]
    fn test_merge_without_scripts() {
        let file = ComponentFile::parse("<template><div /></template>").unwrap();
        assert!(merge_scripts(&file).unwrap().is_none());
    }

    #[test]
    fn test_rebind_default_export() {
        let code = "const a = 1\nexport default defineComponent({ a })\n";
        let rebound = rebind_default_export(code, "ts", "__sfc__").unwrap().unwrap();
        assert_eq!(rebound, "const a = 1\nconst __sfc__ = defineComponent({ a })\n");
        assert!(rebind_default_export("const a = 1", "js", "__sfc__").unwrap().is_none());
    }
}
