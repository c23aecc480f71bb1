//! Component-description (`.vue`) files.
//!
//! A component file is a sequence of top-level sections: at most one plain
//! `<script>`, at most one `<script setup>`, at most one `<template>` and any
//! number of `<style>` blocks. Only the section boundaries and attributes are
//! parsed here; the section contents are handed to the script tooling as-is.

pub mod desugar;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub use desugar::{desugar_setup, merge_scripts, DesugarError};

/// Errors raised while splitting a component file into sections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SfcError {
    #[error("<{tag}> opened at offset {offset} is never closed")]
    Unclosed { tag: String, offset: usize },

    #[error("duplicate {kind} section at offset {offset}")]
    Duplicate { kind: SectionKind, offset: usize },

    #[error("<script> and <script setup> use different languages ({plain} and {setup})")]
    LangMismatch { plain: String, setup: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Script,
    ScriptSetup,
    Template,
    Style,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionKind::Script => "<script>",
            SectionKind::ScriptSetup => "<script setup>",
            SectionKind::Template => "<template>",
            SectionKind::Style => "<style>",
        };
        f.write_str(name)
    }
}

/// One top-level section of a component file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    /// Attribute values; boolean attributes map to `None`
    pub attrs: BTreeMap<String, Option<String>>,
    pub content: String,
    /// Byte range of the content inside the source file
    pub range: Range<usize>,
}

impl Section {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(|v| v.as_deref())
    }

    /// Section language, `js` when no `lang` attribute is given.
    pub fn lang(&self) -> &str {
        self.attr("lang").unwrap_or("js")
    }
}

/// A parsed component file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComponentFile {
    pub script: Option<Section>,
    pub script_setup: Option<Section>,
    pub template: Option<Section>,
    pub styles: Vec<Section>,
}

impl ComponentFile {
    pub fn parse(source: &str) -> Result<Self, SfcError> {
        let mut file = ComponentFile::default();
        let mut pos = 0;

        while let Some(found) = next_open_tag(source, pos) {
            let OpenTag { name, attrs, start, content_start } = found;
            let (content_end, after) = match name.as_str() {
                "template" => find_template_close(source, content_start),
                other => find_close(source, content_start, other),
            }
            .ok_or_else(|| SfcError::Unclosed { tag: name.clone(), offset: start })?;

            let kind = match name.as_str() {
                "script" if attrs.contains_key("setup") => SectionKind::ScriptSetup,
                "script" => SectionKind::Script,
                "template" => SectionKind::Template,
                _ => SectionKind::Style,
            };
            let section = Section {
                kind,
                attrs,
                content: source[content_start..content_end].to_string(),
                range: content_start..content_end,
            };

            let slot = match kind {
                SectionKind::Script => &mut file.script,
                SectionKind::ScriptSetup => &mut file.script_setup,
                SectionKind::Template => &mut file.template,
                SectionKind::Style => {
                    file.styles.push(section);
                    pos = after;
                    continue;
                }
            };
            if slot.is_some() {
                return Err(SfcError::Duplicate { kind, offset: start });
            }
            *slot = Some(section);
            pos = after;
        }

        if let (Some(plain), Some(setup)) = (&file.script, &file.script_setup) {
            if plain.lang() != setup.lang() {
                return Err(SfcError::LangMismatch {
                    plain: plain.lang().to_string(),
                    setup: setup.lang().to_string(),
                });
            }
        }

        Ok(file)
    }

    pub fn has_script(&self) -> bool {
        self.script.is_some() || self.script_setup.is_some()
    }

    /// Language shared by the script sections.
    pub fn script_lang(&self) -> &str {
        self.script_setup.as_ref().or(self.script.as_ref()).map(Section::lang).unwrap_or("js")
    }
}

struct OpenTag {
    name: String,
    attrs: BTreeMap<String, Option<String>>,
    start: usize,
    content_start: usize,
}

static OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(script|template|style)\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .unwrap_or_else(|e| panic!("BUG: invalid section regex: {}", e))
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:@#][\w:.@#-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .unwrap_or_else(|e| panic!("BUG: invalid attribute regex: {}", e))
});

fn next_open_tag(source: &str, from: usize) -> Option<OpenTag> {
    let mut pos = from;
    loop {
        let caps = OPEN_TAG.captures_at(source, pos)?;
        let whole = caps.get(0)?;

        // skip tags that sit inside a top-level HTML comment
        if let Some(comment) = source[pos..whole.start()].rfind("<!--") {
            let comment_start = pos + comment;
            if let Some(close) = source[comment_start..].find("-->") {
                let comment_end = comment_start + close + 3;
                if comment_end > whole.start() {
                    pos = comment_end;
                    continue;
                }
            }
        }

        let raw_attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let self_closing = raw_attrs.trim_end().ends_with('/');
        if self_closing {
            pos = whole.end();
            continue;
        }

        let attrs = ATTRIBUTE
            .captures_iter(raw_attrs)
            .map(|c| {
                let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4));
                (c[1].to_string(), value.map(|v| v.as_str().to_string()))
            })
            .collect();

        return Some(OpenTag {
            name: caps[1].to_string(),
            attrs,
            start: whole.start(),
            content_start: whole.end(),
        });
    }
}

/// Find `</name>`, returning the content end and the offset after the tag.
fn find_close(source: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let needle = format!("</{}", name);
    let start = from + source[from..].find(&needle)?;
    let end = start + source[start..].find('>')? + 1;
    Some((start, end))
}

/// Like [`find_close`] but aware of nested `<template>` elements.
fn find_template_close(source: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let next_close = source[pos..].find("</template")? + pos;
        let next_open = source[pos..next_close]
            .match_indices("<template")
            .map(|(i, _)| pos + i)
            .find(|&i| {
                let rest = &source[i + "<template".len()..];
                rest.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/')
                    && !self_closing_at(source, i)
            });
        match next_open {
            Some(open) => {
                depth += 1;
                pos = open + "<template".len();
            }
            None => {
                depth -= 1;
                let end = next_close + source[next_close..].find('>')? + 1;
                if depth == 0 {
                    return Some((next_close, end));
                }
                pos = end;
            }
        }
    }
}

fn self_closing_at(source: &str, open: usize) -> bool {
    source[open..].find('>').is_some_and(|gt| source[open..open + gt].ends_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUTTON: &str = r#"<template>
  <button :class="cls"><template v-if="icon"><i /></template><slot /></button>
</template>

<script lang="ts" setup>
const props = defineProps<{ icon?: string }>()
</script>

<style scoped>
button { color: red; }
</style>
"#;

    #[test]
    fn test_parse_sections() {
        let file = ComponentFile::parse(BUTTON).unwrap();
        let setup = file.script_setup.as_ref().unwrap();
        assert_eq!(setup.lang(), "ts");
        assert!(setup.content.contains("defineProps"));
        assert!(file.script.is_none());
        assert_eq!(file.styles.len(), 1);
        assert_eq!(file.styles[0].attrs.get("scoped"), Some(&None));
    }

    #[test]
    fn test_nested_template_elements() {
        let file = ComponentFile::parse(BUTTON).unwrap();
        let template = file.template.unwrap();
        assert!(template.content.contains("<template v-if=\"icon\"><i /></template>"));
        assert!(template.content.trim_end().ends_with("</button>"));
    }

    #[test]
    fn test_plain_and_setup_scripts() {
        let source = "<script>\nexport default { name: 'A' }\n</script>\n<script setup>\nconst a = 1\n</script>";
        let file = ComponentFile::parse(source).unwrap();
        assert!(file.script.is_some());
        assert!(file.script_setup.is_some());
        assert_eq!(file.script_lang(), "js");
    }

    #[test]
    fn test_template_only_component_has_no_script() {
        let file = ComponentFile::parse("<template><div /></template>").unwrap();
        assert!(!file.has_script());
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let source = "<script>a</script><script>b</script>";
        assert!(matches!(
            ComponentFile::parse(source),
            Err(SfcError::Duplicate { kind: SectionKind::Script, .. })
        ));
    }

    #[test]
    fn test_unclosed_section_rejected() {
        assert!(matches!(
            ComponentFile::parse("<script setup>\nconst a = 1\n"),
            Err(SfcError::Unclosed { .. })
        ));
    }

    #[test]
    fn test_commented_section_ignored() {
        let source = "<!-- <script>old()</script> -->\n<script setup>\nnow()\n</script>";
        let file = ComponentFile::parse(source).unwrap();
        assert!(file.script.is_none());
        assert!(file.script_setup.unwrap().content.contains("now()"));
    }

    #[test]
    fn test_lang_mismatch_rejected() {
        let source = "<script lang=\"ts\">a</script><script setup>b</script>";
        assert!(matches!(ComponentFile::parse(source), Err(SfcError::LangMismatch { .. })));
    }
}
