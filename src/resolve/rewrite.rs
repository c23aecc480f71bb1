//! Public-path rewriting of emitted declaration text.

use regex::{Captures, Regex};

use crate::build::BuildContext;

/// Rewrites internal-scope specifiers in declaration files to public paths.
///
/// `<scope>/<style>` becomes `<package>/<style>`; any other `<scope>/x`
/// becomes `<package>/es/x`. Only quoted specifiers are touched.
#[derive(Debug, Clone)]
pub struct SpecifierRewriter {
    pattern: Regex,
    style_package: String,
    package: String,
}

impl SpecifierRewriter {
    pub fn new(scope: &str, package: &str, style_package: &str) -> Self {
        let pattern = Regex::new(&format!(r#"(["']){}/([^"'\n]*)"#, regex::escape(scope)))
            .unwrap_or_else(|e| panic!("BUG: invalid specifier regex: {}", e));
        Self {
            pattern,
            style_package: style_package.to_string(),
            package: package.to_string(),
        }
    }

    pub fn from_context(ctx: &BuildContext) -> Self {
        let naming = &ctx.config().naming;
        Self::new(&naming.scope, &naming.package, &naming.style_package)
    }

    pub fn rewrite(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures<'_>| {
                let quote = &caps[1];
                let rest = &caps[2];
                let is_style = rest
                    .strip_prefix(self.style_package.as_str())
                    .is_some_and(|tail| tail.is_empty() || tail.starts_with('/'));
                if is_style {
                    format!("{}{}/{}", quote, self.package, rest)
                } else {
                    format!("{}{}/es/{}", quote, self.package, rest)
                }
            })
            .into_owned()
    }
}
