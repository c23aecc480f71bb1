//! Configuration schema types for `kiln.toml`
//!
//! Defines the structure and validation rules for a component-library build.
//! Every section is optional; a missing `kiln.toml` yields the defaults below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::syntax::is_identifier;

/// Source and output layout of the workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory holding every workspace package
    #[serde(default = "default_packages")]
    pub packages: PathBuf,
    /// Directory name of the entry package under `packages`
    #[serde(default = "default_entry")]
    pub entry: String,
    /// Build output root
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            entry: default_entry(),
            output: default_output(),
        }
    }
}

fn default_packages() -> PathBuf {
    PathBuf::from("packages")
}

fn default_entry() -> String {
    "ui".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("dist")
}

/// Names the library is published under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Internal workspace scope, e.g. `@ui`
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Published package name
    #[serde(default = "default_package")]
    pub package: String,
    /// Human readable name used in bundle banners
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Global namespace of the UMD bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Global namespace prefix of the locale bundles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale_namespace: Option<String>,
    /// Directory name of the style-source package
    #[serde(default = "default_style_package")]
    pub style_package: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            package: default_package(),
            brand: None,
            namespace: None,
            locale_namespace: None,
            style_package: default_style_package(),
        }
    }
}

fn default_scope() -> String {
    "@ui".to_string()
}

fn default_package() -> String {
    "ui".to_string()
}

fn default_style_package() -> String {
    "theme-chalk".to_string()
}

impl NamingConfig {
    /// Brand name, derived from the package name when not configured.
    pub fn brand(&self) -> String {
        self.brand.clone().unwrap_or_else(|| {
            self.package.split(['-', '_']).map(upper_first).collect::<Vec<_>>().join(" ")
        })
    }

    /// UMD namespace, `PascalCase` of the package name by default.
    pub fn namespace(&self) -> String {
        self.namespace.clone().unwrap_or_else(|| pascal_case(&self.package))
    }

    /// Locale UMD namespace prefix, `<namespace>Locale` by default.
    pub fn locale_namespace(&self) -> String {
        self.locale_namespace.clone().unwrap_or_else(|| format!("{}Locale", self.namespace()))
    }
}

/// Dependency classification inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependenciesConfig {
    /// Scope whose packages are never bundled into module outputs
    #[serde(default = "default_reserved_scope")]
    pub reserved_scope: String,
    /// Manifest listing dependencies; the entry package manifest by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            reserved_scope: default_reserved_scope(),
            manifest: None,
        }
    }
}

fn default_reserved_scope() -> String {
    "@vue".to_string()
}

/// Tree-preserving module build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Source extensions compiled to modules
    #[serde(default = "default_module_extensions")]
    pub extensions: Vec<String>,
    /// Path segments and file stems never treated as sources
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            extensions: default_module_extensions(),
            exclude: default_exclude(),
        }
    }
}

fn default_module_extensions() -> Vec<String> {
    vec!["js".to_string(), "ts".to_string(), "vue".to_string()]
}

fn default_exclude() -> Vec<String> {
    ["node_modules", "test", "tests", "__tests__", "mock", "__mocks__", "gulpfile", "dist"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Stem of the self-contained bundle when none is configured
pub const DEFAULT_ENTRY_NAME: &str = "index.full";

/// Self-contained browser bundle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Bundle file stem; `index.full` by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_name: Option<String>,
    /// Global variable names of external dependencies
    #[serde(default = "default_globals")]
    pub globals: BTreeMap<String, String>,
    /// Locale sources, relative to the packages directory
    #[serde(default = "default_locale_dir")]
    pub locale_dir: PathBuf,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            entry_name: None,
            globals: default_globals(),
            locale_dir: default_locale_dir(),
        }
    }
}

fn default_globals() -> BTreeMap<String, String> {
    BTreeMap::from([("vue".to_string(), "Vue".to_string())])
}

fn default_locale_dir() -> PathBuf {
    PathBuf::from("locale/lang")
}

/// Declaration generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypesConfig {
    /// Ambient environment declarations registered before every unit
    #[serde(default = "default_env")]
    pub env: Option<PathBuf>,
    /// Declaration output directory, relative to the output root
    #[serde(default = "default_types_out")]
    pub out: PathBuf,
    /// Source extensions considered for declarations
    #[serde(default = "default_types_extensions")]
    pub extensions: Vec<String>,
    /// TypeScript compiler executable; `vue-tsc` or `tsc` from the
    /// workspace's `node_modules/.bin` or `PATH` when unset
    #[serde(default)]
    pub compiler: Option<PathBuf>,
}

impl Default for TypesConfig {
    fn default() -> Self {
        Self {
            env: default_env(),
            out: default_types_out(),
            extensions: default_types_extensions(),
            compiler: None,
        }
    }
}

fn default_env() -> Option<PathBuf> {
    Some(PathBuf::from("typings/env.d.ts"))
}

fn default_types_out() -> PathBuf {
    PathBuf::from("types")
}

fn default_types_extensions() -> Vec<String> {
    ["js", "jsx", "ts", "tsx", "vue"].iter().map(|s| s.to_string()).collect()
}

/// Resource catalog merge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Directory holding one subdirectory per language
    #[serde(default = "default_locale_source")]
    pub source: PathBuf,
    /// Merged catalog output directory
    #[serde(default = "default_locale_output")]
    pub output: PathBuf,
    /// Language every other language is mirrored from
    #[serde(default = "default_canonical")]
    pub canonical: String,
    /// File name of the language manifest
    #[serde(default = "default_locale_manifest")]
    pub manifest: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            source: default_locale_source(),
            output: default_locale_output(),
            canonical: default_canonical(),
            manifest: default_locale_manifest(),
        }
    }
}

fn default_locale_source() -> PathBuf {
    PathBuf::from("docs/i18n/source")
}

fn default_locale_output() -> PathBuf {
    PathBuf::from("docs/i18n/merged")
}

fn default_canonical() -> String {
    "en-US".to_string()
}

fn default_locale_manifest() -> String {
    "lang.json".to_string()
}

/// Stylesheet build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Stylesheet sources; `<packages>/<style_package>/src` by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Prefix added to component stylesheet names
    #[serde(default = "default_theme_prefix")]
    pub prefix: String,
    /// Stylesheets that keep their own name
    #[serde(default = "default_unprefixed")]
    pub unprefixed: Vec<String>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            source: None,
            prefix: default_theme_prefix(),
            unprefixed: default_unprefixed(),
        }
    }
}

fn default_theme_prefix() -> String {
    "el-".to_string()
}

fn default_unprefixed() -> Vec<String> {
    vec!["index".to_string(), "base".to_string(), "display".to_string()]
}

/// Release stamping settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReleaseConfig {
    /// Manifests to stamp; the entry package manifest when empty
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
}

/// Extra files copied next to the published manifest
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CopyConfig {
    /// Root-relative files copied into the package output root
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Complete kiln.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KilnConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub dependencies: DependenciesConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub types: TypesConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub release: ReleaseConfig,
    #[serde(default)]
    pub copy: CopyConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "naming.scope")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kiln.toml: '{}' {}", self.field, self.message)
    }
}

impl KilnConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: &str| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: message.to_string(),
            });
        };

        if self.project.entry.is_empty() || self.project.entry.contains(['/', '\\']) {
            error("project.entry", "must be a single directory name");
        }

        if !self.naming.scope.starts_with('@') || self.naming.scope.len() < 2 {
            error("naming.scope", "must start with '@' followed by a name");
        }
        if self.naming.scope.contains('/') {
            error("naming.scope", "must not contain '/'");
        }
        if self.naming.package.is_empty() {
            error("naming.package", "must be a non-empty string");
        }
        if self.naming.style_package.is_empty() {
            error("naming.style_package", "must be a non-empty string");
        }
        if !is_identifier(&self.naming.namespace()) {
            error("naming.namespace", "must be a valid JavaScript identifier");
        }
        if !is_identifier(&self.naming.locale_namespace()) {
            error("naming.locale_namespace", "must be a valid JavaScript identifier");
        }

        if self.modules.extensions.is_empty() {
            error("modules.extensions", "must contain at least one extension");
        }

        for (module, global) in &self.bundle.globals {
            if !is_identifier(global) {
                error(&format!("bundle.globals.{}", module), "must be a valid JavaScript identifier");
            }
        }
        if self.bundle.entry_name.as_deref() == Some("") {
            error("bundle.entry_name", "must be a non-empty string");
        }

        if self.locale.canonical.is_empty() {
            error("locale.canonical", "must be a non-empty string");
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Bundle file stem.
    pub fn entry_name(&self) -> &str {
        self.bundle.entry_name.as_deref().unwrap_or(DEFAULT_ENTRY_NAME)
    }
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `element-plus` -> `ElementPlus`, `zh-cn` -> `ZhCn`
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric()).map(upper_first).collect()
}

/// `element-plus` -> `elementPlus`, `@vue/shared` -> `vueShared`
pub fn camel_case(name: &str) -> String {
    let pascal = pascal_case(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_parse() {
        let config: KilnConfig = toml::from_str("").unwrap();
        assert_eq!(config.project.packages, PathBuf::from("packages"));
        assert_eq!(config.project.entry, "ui");
        assert_eq!(config.modules.extensions, vec!["js", "ts", "vue"]);
        assert_eq!(config.bundle.globals.get("vue").map(String::as_str), Some("Vue"));
        assert!(config.is_valid());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[project]
packages = "packages"
entry = "element-plus"
output = "dist"

[naming]
scope = "@element-plus"
package = "element-plus"
brand = "Element Plus"
style_package = "theme-chalk"

[dependencies]
reserved_scope = "@vue"

[modules]
exclude = ["test", "__tests__"]

[bundle]
entry_name = "index.full"
locale_dir = "locale/lang"

[bundle.globals]
vue = "Vue"
dayjs = "dayjs"

[types]
env = "typings/env.d.ts"
out = "types"

[locale]
source = "docs/crowdin"
output = "docs/i18n"
canonical = "en-US"

[theme]
prefix = "el-"
unprefixed = ["index", "base", "display"]

[release]
manifests = ["packages/element-plus/package.json"]

[copy]
files = ["README.md", "typings/global.d.ts"]
"#;
        let config: KilnConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.naming.scope, "@element-plus");
        assert_eq!(config.naming.namespace(), "ElementPlus");
        assert_eq!(config.naming.locale_namespace(), "ElementPlusLocale");
        assert_eq!(config.naming.brand(), "Element Plus");
        assert_eq!(config.entry_name(), "index.full");
        assert_eq!(config.bundle.globals.len(), 2);
        assert_eq!(config.modules.exclude, vec!["test", "__tests__"]);
        assert_eq!(config.copy.files.len(), 2);
        assert!(config.is_valid());
    }

    #[test]
    fn test_entry_name_defaults_to_index_full() {
        let mut config = KilnConfig::default();
        config.naming.package = "ui-kit".to_string();
        assert_eq!(config.entry_name(), "index.full");

        config.bundle.entry_name = Some("ui-kit".to_string());
        assert_eq!(config.entry_name(), "ui-kit");
    }

    #[test]
    fn test_derived_names() {
        let naming = NamingConfig {
            package: "my-lib".to_string(),
            ..Default::default()
        };
        assert_eq!(naming.brand(), "My Lib");
        assert_eq!(naming.namespace(), "MyLib");
        assert_eq!(naming.locale_namespace(), "MyLibLocale");
    }

    #[test]
    fn test_validation_bad_scope() {
        let mut config = KilnConfig::default();
        config.naming.scope = "ui".to_string();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "naming.scope");
    }

    #[test]
    fn test_validation_bad_global() {
        let mut config = KilnConfig::default();
        config.bundle.globals.insert("dayjs".to_string(), "day-js".to_string());
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("bundle.globals.dayjs"));
    }

    #[test]
    fn test_validation_nested_entry() {
        let mut config = KilnConfig::default();
        config.project.entry = "a/b".to_string();
        assert!(!config.is_valid());
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(pascal_case("zh-cn"), "ZhCn");
        assert_eq!(pascal_case("element-plus"), "ElementPlus");
        assert_eq!(camel_case("@vue/shared"), "vueShared");
        assert_eq!(camel_case("lodash-unified"), "lodashUnified");
    }
}
