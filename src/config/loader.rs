//! Configuration loading and discovery for `kiln.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::KilnConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file looked up in the project tree.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse kiln.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output directory
    pub output: Option<PathBuf>,
    /// Override the bundle entry name
    pub entry_name: Option<String>,
}

/// Find kiln.toml by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if a kiln.toml file is found
/// - `None` if no config file is found
pub fn find_config() -> Option<PathBuf> {
    let cwd = env::current_dir().ok()?;
    find_config_from(cwd)
}

/// Find kiln.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a kiln.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// configuration.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("my-lib/kiln.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<KilnConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(KilnConfig::default()),
    }
}

/// Load configuration from a specific file path.
pub fn load_config_file(path: &Path) -> Result<KilnConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig = toml::from_str(contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut KilnConfig, overrides: &CliOverrides) {
    if let Some(ref output) = overrides.output {
        config.project.output = output.clone();
    }

    if let Some(ref entry_name) = overrides.entry_name {
        config.bundle.entry_name = Some(entry_name.clone());
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the kiln.toml file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(contents.as_bytes())
            .expect("should write config content");
        config_path
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[naming]\npackage = \"lib\"");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "");

        let subdir = temp.path().join("packages").join("components");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, None);
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(
            temp.path(),
            "[project]\nentry = \"element-plus\"\n\n[naming]\nscope = \"@element-plus\"\n",
        );

        let config = load_config(Some(&config_path)).expect("config should load");
        assert_eq!(config.project.entry, "element-plus");
        assert_eq!(config.naming.scope, "@element-plus");
        assert_eq!(config.naming.package, "ui");
    }

    #[test]
    fn test_load_config_missing_file_is_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join(CONFIG_FILE)));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[project\nentry = ");

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[naming]\nscope = \"no-at\"\n");

        let err = load_config(Some(&config_path)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("naming.scope"));
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = KilnConfig::default();
        let overrides = CliOverrides {
            output: Some(PathBuf::from("out")),
            entry_name: Some("ui-kit".to_string()),
        };
        merge_cli_overrides(&mut config, &overrides);

        assert_eq!(config.project.output, PathBuf::from("out"));
        assert_eq!(config.entry_name(), "ui-kit");
    }

    #[test]
    fn test_merge_cli_overrides_empty_keeps_config() {
        let mut config = KilnConfig::default();
        merge_cli_overrides(&mut config, &CliOverrides::default());
        assert_eq!(config.project.output, PathBuf::from("dist"));
    }

    #[test]
    fn test_resolve_path_absolute() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, Path::new("/other")), PathBuf::from("/other"));
    }

    #[test]
    fn test_resolve_path_relative() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, Path::new("packages")), PathBuf::from("/project/packages"));
    }

    #[test]
    fn test_project_root() {
        let config_path = Path::new("/project/kiln.toml");
        assert_eq!(project_root(config_path), Some(Path::new("/project")));
    }
}
