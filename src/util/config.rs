//! Configuration file support for specforge.
//!
//! Two configuration file locations are read:
//! - Global: `<config dir>/specforge/config.toml` - User-wide defaults
//! - Project: `.specforge/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::macros::SettingValue;

/// specforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories scanned for `.xcspec` files
    pub search_paths: Vec<SearchPath>,

    /// Domain -> ordered list of domains it also searches
    pub domain_inclusions: BTreeMap<String, Vec<String>>,

    /// `"domain:identifier"` -> extra domains the spec is duplicated into
    pub domain_remaps: BTreeMap<String, Vec<String>>,

    /// Default setting values for scopes built by the CLI
    pub settings: BTreeMap<String, ConfigValue>,
}

/// A spec directory and the domain its specs default to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPath {
    pub path: PathBuf,

    #[serde(default)]
    pub domain: String,
}

impl SearchPath {
    pub fn new(path: impl Into<PathBuf>, domain: impl Into<String>) -> Self {
        SearchPath {
            path: path.into(),
            domain: domain.into(),
        }
    }
}

/// A setting value as written in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    List(Vec<String>),
}

impl From<ConfigValue> for SettingValue {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::String(s) => SettingValue::String(s),
            ConfigValue::List(items) => SettingValue::List(items),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        // Relative search paths are relative to the project root, not the config dir.
        if let Some(root) = path.parent().and_then(Path::parent) {
            for search in &mut config.search_paths {
                if search.path.is_relative() {
                    search.path = root.join(&search.path);
                }
            }
        }

        Ok(config)
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        for search in other.search_paths {
            if !self.search_paths.contains(&search) {
                self.search_paths.push(search);
            }
        }
        // Table entries are replaced whole, not merged element-wise
        self.domain_inclusions.extend(other.domain_inclusions);
        self.domain_remaps.extend(other.domain_remaps);
        self.settings.extend(other.settings);
    }

    /// Add a search path in the default domain, ignoring duplicates.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let search = SearchPath::new(path, "");
        if !self.search_paths.contains(&search) {
            self.search_paths.push(search);
        }
    }

    /// Configured remap for `domain:identifier`, if any.
    pub fn remap_for(&self, domain: &str, identifier: &str) -> Option<&[String]> {
        self.domain_remaps
            .get(&format!("{}:{}", domain, identifier))
            .map(Vec::as_slice)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.specforge/config.toml)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// The global specforge config directory.
pub fn global_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "specforge", "specforge")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// The global config path.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// The project config path (.specforge/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".specforge").join("config.toml")
}

/// Load setting values from a standalone TOML table.
pub fn load_settings_file(path: &Path) -> Result<BTreeMap<String, ConfigValue>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file: {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse settings file: {}", path.display()))
}
