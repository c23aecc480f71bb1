//! Source unit -> declaration unit.
//!
//! Scripts pass through unchanged. Component files contribute their merged
//! script sections under the identity `<logical>.<lang>`, or nothing when
//! they have no script at all.

use std::path::{Path, PathBuf};

use crate::build::discovery::{SourceUnit, UnitKind};
use crate::sfc::{merge_scripts, ComponentFile};

use super::{DeclarationError, DeclarationUnit, Grammar};

/// Directive that disables checking of a whole unit.
pub const NO_CHECK_DIRECTIVE: &str = "@ts-nocheck";

/// Read a unit and derive its declaration unit.
pub fn extract_unit(unit: &SourceUnit) -> Result<Option<DeclarationUnit>, DeclarationError> {
    let text = std::fs::read_to_string(&unit.path)
        .map_err(|source| DeclarationError::Io { path: unit.path.clone(), source })?;
    extract(unit, &text)
}

/// Derive the declaration unit of `unit` from its text.
///
/// Identical input always yields byte-identical content.
pub fn extract(unit: &SourceUnit, text: &str) -> Result<Option<DeclarationUnit>, DeclarationError> {
    match unit.kind {
        UnitKind::Script => {
            let grammar = Grammar::from_extension(unit.extension()).unwrap_or(Grammar::Ts);
            Ok(Some(DeclarationUnit {
                id: unit.logical.clone(),
                logical: unit.logical.clone(),
                source: unit.path.clone(),
                grammar,
                content: text.to_string(),
            }))
        }
        UnitKind::Component => extract_component(unit, text),
    }
}

fn extract_component(
    unit: &SourceUnit,
    text: &str,
) -> Result<Option<DeclarationUnit>, DeclarationError> {
    let file = ComponentFile::parse(text)
        .map_err(|source| DeclarationError::Component { path: unit.path.clone(), source })?;
    let Some(merged) = merge_scripts(&file)
        .map_err(|source| DeclarationError::Desugar { path: unit.path.clone(), source })?
    else {
        return Ok(None);
    };

    let grammar = Grammar::from_extension(&merged.lang).unwrap_or(Grammar::Js);
    let mut content = String::with_capacity(merged.code.len() + 16);
    if text.contains(NO_CHECK_DIRECTIVE) {
        content.push_str("// ");
        content.push_str(NO_CHECK_DIRECTIVE);
        content.push('\n');
    }
    content.push_str(&merged.code);

    Ok(Some(DeclarationUnit {
        id: tagged_path(&unit.logical, grammar),
        logical: unit.logical.clone(),
        source: unit.path.clone(),
        grammar,
        content,
    }))
}

/// `a/b.vue` -> `a/b.vue.ts`
fn tagged_path(logical: &Path, grammar: Grammar) -> PathBuf {
    let mut name = logical.as_os_str().to_os_string();
    name.push(".");
    name.push(grammar.extension());
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(logical: &str) -> SourceUnit {
        let kind = if logical.ends_with(".vue") { UnitKind::Component } else { UnitKind::Script };
        SourceUnit {
            path: PathBuf::from("/p/packages").join(logical),
            logical: PathBuf::from(logical),
            kind,
        }
    }

    #[test]
    fn test_script_passes_through() {
        let text = "export const a: number = 1\n";
        let derived = extract(&unit("utils/a.ts"), text)
            .expect("should extract")
            .expect("should keep script units");
        assert_eq!(derived.content, text);
        assert_eq!(derived.id, PathBuf::from("utils/a.ts"));
        assert_eq!(derived.grammar, Grammar::Ts);
    }

    #[test]
    fn test_component_without_script_is_dropped() {
        let text = "<template><div /></template>\n<style>.a{}</style>\n";
        let derived = extract(&unit("components/a/src/a.vue"), text).expect("should extract");
        assert!(derived.is_none());
    }

    #[test]
    fn test_component_identity_carries_lang() {
        let text = "<script lang=\"ts\">\nexport default { name: 'ElA' }\n</script>\n";
        let derived = extract(&unit("components/a/src/a.vue"), text)
            .expect("should extract")
            .expect("should keep scripted components");
        assert_eq!(derived.id, PathBuf::from("components/a/src/a.vue.ts"));
        assert_eq!(derived.logical, PathBuf::from("components/a/src/a.vue"));
        assert_eq!(derived.grammar, Grammar::Ts);
        assert!(derived.content.contains("export default { name: 'ElA' }"));
    }

    #[test]
    fn test_plain_component_defaults_to_js() {
        let text = "<script>\nexport default {}\n</script>\n";
        let derived = extract(&unit("a.vue"), text)
            .expect("should extract")
            .expect("should keep scripted components");
        assert_eq!(derived.id, PathBuf::from("a.vue.js"));
    }

    #[test]
    fn test_setup_surface_lists_every_binding() {
        let text = "<script setup lang=\"ts\">\nimport { ref } from 'vue'\nimport type { Props } from './props'\nconst count = ref(0)\nfunction inc() { count.value++ }\n</script>\n";
        let derived = extract(&unit("a.vue"), text)
            .expect("should extract")
            .expect("should keep scripted components");
        assert!(derived.content.contains("const __returned__ = { ref, count, inc }"));
        assert!(!derived.content.contains("__returned__ = { ref, Props"));
    }

    #[test]
    fn test_no_check_directive_is_hoisted() {
        let text = "<script setup lang=\"ts\">\n// @ts-nocheck\nconst a = 1\n</script>\n";
        let derived = extract(&unit("a.vue"), text)
            .expect("should extract")
            .expect("should keep scripted components");
        assert!(derived.content.starts_with("// @ts-nocheck\n"));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "<script lang=\"ts\">\nexport default { name: 'A' }\n</script>\n<script setup lang=\"ts\">\nconst b = 1\n</script>\n";
        let first = extract(&unit("a.vue"), text).expect("should extract");
        let second = extract(&unit("a.vue"), text).expect("should extract");
        assert_eq!(first, second);
    }
}
