use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use resconf_core::{ConfigError, ConfigResult, EntityKind, Options};

/// Resolved entries of one kind plus the aliases that reach them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSet {
    #[serde(default)]
    pub configs: BTreeMap<String, Options>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl ResolvedSet {
    /// Canonical name for `name`: itself when stored directly, else the
    /// alias target.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.configs.get_key_value(name) {
            return Some(key.as_str());
        }
        self.aliases
            .get(name)
            .filter(|target| self.configs.contains_key(*target))
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.canonical(name).is_some()
    }

    /// Resolved options for `name`, following aliases.
    pub fn get(&self, name: &str) -> Option<&Options> {
        self.canonical(name).and_then(|key| self.configs.get(key))
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    /// Store a resolved entry resolved from raw `key`. A second entry
    /// claiming the same name is a configuration error.
    pub(crate) fn insert(
        &mut self,
        kind: EntityKind,
        name: &str,
        key: &str,
        options: Options,
    ) -> ConfigResult<()> {
        if self.configs.contains_key(name) {
            return Err(ConfigError::DuplicateName {
                kind,
                name: name.to_string(),
                key: key.to_string(),
            });
        }
        self.configs.insert(name.to_string(), options);
        Ok(())
    }

    /// Point `alias` at `name`. An alias already claimed by another entry
    /// stays with its first owner.
    pub(crate) fn add_alias(&mut self, kind: EntityKind, alias: &str, name: &str) {
        if alias.is_empty() || alias == name || self.configs.contains_key(alias) {
            return;
        }
        match self.aliases.get(alias) {
            Some(existing) if existing == name => {}
            Some(existing) => {
                tracing::warn!(
                    kind = %kind,
                    alias,
                    kept = %existing,
                    ignored = name,
                    "Alias claimed by two entries; keeping first"
                );
            }
            None => {
                self.aliases.insert(alias.to_string(), name.to_string());
            }
        }
    }
}
