//! Settings for the compiler itself, layered from a user file and a
//! project file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use resconf_core::merge_values;

const PROJECT_DIR: &str = ".resconf";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CompilerSettings {
    pub cache: CacheSettings,
    pub registry: RegistrySettings,
}

/// Persisted compile output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Relative paths resolve against the project root.
    pub path: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from(PROJECT_DIR).join("compiled.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Drain every registry once at startup so lookups never populate
    /// caches under concurrent readers.
    pub warm_up: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self { warm_up: true }
    }
}

impl CompilerSettings {
    /// Load user settings merged with `<project_root>/.resconf/settings.toml`.
    ///
    /// Returns `Ok(None)` when neither file exists.
    pub fn load(project_root: &Path) -> Result<Option<Self>> {
        let user_path = Self::user_settings_path();
        let project_path = Self::project_settings_path(project_root);
        Self::load_with_paths(user_path.as_deref(), &project_path)
    }

    /// Load with explicit paths. Project values override user values.
    pub fn load_with_paths(user_path: Option<&Path>, project_path: &Path) -> Result<Option<Self>> {
        let user_path = user_path.filter(|p| p.exists());
        let project_exists = project_path.exists();

        match (user_path, project_exists) {
            (None, false) => Ok(None),
            (Some(user), false) => Self::load_from_path(user).map(Some),
            (None, true) => Self::load_from_path(project_path).map(Some),
            (Some(user), true) => Self::load_merged(user, project_path).map(Some),
        }
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    fn load_merged(user_path: &Path, project_path: &Path) -> Result<Self> {
        let user = read_toml(user_path)?;
        let project = read_toml(project_path)?;
        let merged = merge_values(user, project);
        tracing::debug!(
            user = %user_path.display(),
            project = %project_path.display(),
            "Merged compiler settings"
        );
        serde_json::from_value(merged).context("Failed to deserialize merged settings")
    }

    /// `<config_dir>/resconf/settings.toml` for the current user.
    pub fn user_settings_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "resconf")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    pub fn project_settings_path(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join(SETTINGS_FILE)
    }

    /// Absolute location of the persisted compile output.
    pub fn cache_path(&self, project_root: &Path) -> PathBuf {
        if self.cache.path.is_absolute() {
            self.cache.path.clone()
        } else {
            project_root.join(&self.cache.path)
        }
    }
}

/// A settings file as a JSON value, ready for [`merge_values`].
fn read_toml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings: {}", path.display()))?;
    let table: toml::Table = toml::from_str(&content)
        .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
    serde_json::to_value(table)
        .with_context(|| format!("Failed to convert settings: {}", path.display()))
}
