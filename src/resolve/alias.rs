//! Style-source aliasing.
//!
//! Components import their stylesheets from the internal style-source
//! package. Outputs must reference the published style subpath instead, and
//! never inline it.

use crate::build::BuildContext;

/// Result of an alias rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAlias {
    pub id: String,
    pub external: bool,
}

#[derive(Debug, Clone)]
pub struct AliasRewriter {
    /// `<scope>/<style>`
    source: String,
    /// `<package>/<style>`
    public: String,
}

impl AliasRewriter {
    pub fn new(source: impl Into<String>, public: impl Into<String>) -> Self {
        Self { source: source.into(), public: public.into() }
    }

    pub fn from_context(ctx: &BuildContext) -> Self {
        Self::new(ctx.style_source_specifier(), ctx.style_public_specifier())
    }

    /// Rewrite a specifier naming the style-source package or a path under it.
    pub fn rewrite(&self, specifier: &str) -> Option<ResolvedAlias> {
        let rest = specifier.strip_prefix(&self.source)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        Some(ResolvedAlias { id: format!("{}{}", self.public, rest), external: true })
    }
}
