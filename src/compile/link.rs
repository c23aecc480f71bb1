//! Single-file bundle linking.
//!
//! Modules compiled to CommonJS are placed in a registry keyed by module id
//! and evaluated on first `__require__`. Externals are looked up before the
//! registry; the container (UMD factory or ESM module) supplies them and
//! exposes the entry module's exports.

use crate::build::target::ModuleFormat;
use crate::syntax::is_identifier;

use super::sourcemap::LineMap;
use super::transform::line_count;
use super::{js_string, member_access, BundleExports, BundleInput, Chunk, CompileError};

const REQUIRE_RUNTIME: &str = "\
var __cache__ = {};
function __require__(id) {
  if (Object.prototype.hasOwnProperty.call(__externals__, id)) return __externals__[id];
  var cached = __cache__[id];
  if (cached) return cached.exports;
  if (!Object.prototype.hasOwnProperty.call(__modules__, id)) throw new Error('Cannot find module ' + id);
  var module = __cache__[id] = { exports: {} };
  __modules__[id].call(module.exports, module, module.exports, __require__);
  return module.exports;
}
function __interop__(ns) { return ns && ns.__esModule ? ns : Object.assign({ __esModule: true, default: ns }, ns); }";

/// Bundle text under construction with its line map.
#[derive(Default)]
struct Output {
    code: String,
    map: LineMap,
}

impl Output {
    fn line(&mut self, text: &str) {
        for line in text.lines() {
            self.code.push_str(line);
            self.code.push('\n');
            self.map.push_unmapped();
        }
    }

    fn chunk(&mut self, chunk: &Chunk) {
        let code = chunk.code.trim_end_matches('\n');
        let lines = line_count(code);
        self.code.push_str(code);
        self.code.push('\n');
        match &chunk.map {
            Some(map) => {
                let mut map = map.clone();
                map.lines.truncate(lines);
                map.pad_to(lines);
                self.map.append(&map);
            }
            None => (0..lines).for_each(|_| self.map.push_unmapped()),
        }
    }

    fn finish(self) -> Chunk {
        Chunk { code: self.code, map: Some(self.map) }
    }
}

fn external_param(index: usize) -> String {
    format!("__external_{}", index)
}

/// Link compiled modules into one file.
pub fn link_bundle(bundle: &BundleInput<'_>) -> Result<Chunk, CompileError> {
    if !bundle.modules.iter().any(|m| m.id == bundle.entry) {
        return Err(CompileError::Link { message: format!("entry module {} is missing", bundle.entry) });
    }
    let mut out = Output::default();
    if let Some(banner) = bundle.banner {
        out.line(banner);
    }
    match bundle.format {
        ModuleFormat::Esm => link_esm(bundle, &mut out),
        ModuleFormat::Umd | ModuleFormat::Cjs => link_umd(bundle, &mut out),
    }
    Ok(out.finish())
}

fn write_registry(bundle: &BundleInput<'_>, out: &mut Output) {
    out.line("var __externals__ = {");
    for (index, external) in bundle.externals.iter().enumerate() {
        out.line(&format!(
            "  {}: __interop__({}),",
            js_string(&external.specifier),
            external_param(index)
        ));
    }
    out.line("};");
    out.line("var __modules__ = {");
    for module in bundle.modules {
        out.line(&format!("{}: function (module, exports, require) {{", js_string(&module.id)));
        out.chunk(&module.chunk);
        out.line("},");
    }
    out.line("};");
    out.line(REQUIRE_RUNTIME);
}

fn link_umd(bundle: &BundleInput<'_>, out: &mut Output) {
    let requires: Vec<String> =
        bundle.externals.iter().map(|e| format!("require({})", js_string(&e.specifier))).collect();
    let amd: Vec<String> = bundle.externals.iter().map(|e| js_string(&e.specifier)).collect();
    let globals: Vec<String> = bundle.externals.iter().map(|e| member_access("global", &e.global)).collect();
    let params: Vec<String> = (0..bundle.externals.len()).map(external_param).collect();
    let namespace = member_access("global", bundle.global_name);

    out.line("(function (global, factory) {");
    match &bundle.exports {
        BundleExports::Named(_) => {
            let cjs_args = std::iter::once("exports".to_string()).chain(requires).collect::<Vec<_>>();
            let amd_deps = std::iter::once(js_string("exports")).chain(amd).collect::<Vec<_>>();
            let global_args =
                std::iter::once(format!("{} = {{}}", namespace)).chain(globals).collect::<Vec<_>>();
            out.line(&format!(
                "  typeof exports === 'object' && typeof module !== 'undefined' ? factory({}) :",
                cjs_args.join(", ")
            ));
            out.line(&format!(
                "  typeof define === 'function' && define.amd ? define([{}], factory) :",
                amd_deps.join(", ")
            ));
            out.line(&format!(
                "  (global = typeof globalThis !== 'undefined' ? globalThis : global || self, factory({}));",
                global_args.join(", ")
            ));
            let factory_params =
                std::iter::once("exports".to_string()).chain(params).collect::<Vec<_>>();
            out.line(&format!(
                "}})(this, (function ({}) {{ 'use strict';",
                factory_params.join(", ")
            ));
            write_registry(bundle, out);
            out.line(&format!("var __entry__ = __require__({});", js_string(bundle.entry)));
            out.line("Object.keys(__entry__).forEach(function (key) { if (key !== '__esModule') Object.defineProperty(exports, key, { enumerable: true, get: function () { return __entry__[key]; } }); });");
            out.line("Object.defineProperty(exports, '__esModule', { value: true });");
        }
        BundleExports::Default => {
            out.line(&format!(
                "  typeof exports === 'object' && typeof module !== 'undefined' ? module.exports = factory({}) :",
                requires.join(", ")
            ));
            out.line(&format!(
                "  typeof define === 'function' && define.amd ? define([{}], factory) :",
                amd.join(", ")
            ));
            out.line(&format!(
                "  (global = typeof globalThis !== 'undefined' ? globalThis : global || self, {} = factory({}));",
                namespace,
                globals.join(", ")
            ));
            out.line(&format!("}})(this, (function ({}) {{ 'use strict';", params.join(", ")));
            write_registry(bundle, out);
            out.line(&format!("return __require__({}).default;", js_string(bundle.entry)));
        }
    }
    out.line("}));");
}

fn link_esm(bundle: &BundleInput<'_>, out: &mut Output) {
    for (index, external) in bundle.externals.iter().enumerate() {
        out.line(&format!("import * as {} from {};", external_param(index), js_string(&external.specifier)));
    }
    write_registry(bundle, out);
    match &bundle.exports {
        BundleExports::Named(names) => {
            out.line(&format!("var __entry__ = __require__({});", js_string(bundle.entry)));
            let mut specifiers = Vec::new();
            for (index, name) in names.iter().filter(|n| *n != "default").enumerate() {
                let local = format!("__export_{}", index);
                out.line(&format!("var {} = {};", local, member_access("__entry__", name)));
                let exported = if is_identifier(name) { name.clone() } else { js_string(name) };
                specifiers.push(format!("{} as {}", local, exported));
            }
            if !specifiers.is_empty() {
                out.line(&format!("export {{ {} }};", specifiers.join(", ")));
            }
            if names.iter().any(|n| n == "default") {
                out.line("export default __entry__.default;");
            }
        }
        BundleExports::Default => {
            out.line(&format!("export default __require__({}).default;", js_string(bundle.entry)));
        }
    }
}
