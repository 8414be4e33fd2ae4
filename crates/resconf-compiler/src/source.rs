//! Raw configuration store.
//!
//! Ingestion adapters register partial option maps per kind and name on a
//! [`MutableConfigSource`]. Repeated registration under one name deep-merges
//! into the stored entry. [`MutableConfigSource::lock`] consumes the store
//! and yields a read-only [`FrozenConfigSource`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use resconf_core::naming::{derive_name, is_type_identifier, is_valid_name};
use resconf_core::{ConfigError, ConfigResult, EntityKind, Options, merge_options};
use resconf_schema::TypeCatalog;

/// Raw entries for every kind, keyed by declared name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntries {
    #[serde(default)]
    pub permissions: BTreeMap<String, Options>,
    #[serde(default)]
    pub namespaces: BTreeMap<String, Options>,
    #[serde(default)]
    pub actions: BTreeMap<String, Options>,
    #[serde(default)]
    pub behaviors: BTreeMap<String, Options>,
    #[serde(default)]
    pub resources: BTreeMap<String, Options>,
}

impl RawEntries {
    pub fn of(&self, kind: EntityKind) -> &BTreeMap<String, Options> {
        match kind {
            EntityKind::Permission => &self.permissions,
            EntityKind::Namespace => &self.namespaces,
            EntityKind::Action => &self.actions,
            EntityKind::Behavior => &self.behaviors,
            EntityKind::Resource => &self.resources,
        }
    }

    fn of_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, Options> {
        match kind {
            EntityKind::Permission => &mut self.permissions,
            EntityKind::Namespace => &mut self.namespaces,
            EntityKind::Action => &mut self.actions,
            EntityKind::Behavior => &mut self.behaviors,
            EntityKind::Resource => &mut self.resources,
        }
    }

    pub fn len(&self) -> usize {
        EntityKind::ALL.iter().map(|kind| self.of(*kind).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical JSON value of every entry, kinds in resolution order.
    pub fn to_value(&self) -> Value {
        let mut root = Options::new();
        for kind in EntityKind::ALL {
            let entries: Options = self
                .of(kind)
                .iter()
                .map(|(name, options)| (name.clone(), Value::Object(options.clone())))
                .collect();
            root.insert(kind.as_str().to_string(), Value::Object(entries));
        }
        Value::Object(root)
    }
}

/// Store accepting registrations. Consumed by [`MutableConfigSource::lock`].
#[derive(Debug, Clone)]
pub struct MutableConfigSource {
    catalog: Arc<TypeCatalog>,
    entries: RawEntries,
}

impl MutableConfigSource {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            entries: RawEntries::default(),
        }
    }

    /// Start from previously collected entries, e.g. deserialized from disk.
    pub fn from_entries(catalog: Arc<TypeCatalog>, entries: RawEntries) -> Self {
        Self { catalog, entries }
    }

    pub fn add_permission(&mut self, name: &str, options: Options) -> ConfigResult<Options> {
        self.add(EntityKind::Permission, name, options)
    }

    pub fn add_namespace(&mut self, name: &str, options: Options) -> ConfigResult<Options> {
        self.add(EntityKind::Namespace, name, options)
    }

    pub fn add_action(&mut self, name: &str, options: Options) -> ConfigResult<Options> {
        self.add(EntityKind::Action, name, options)
    }

    pub fn add_behavior(&mut self, name: &str, options: Options) -> ConfigResult<Options> {
        self.add(EntityKind::Behavior, name, options)
    }

    pub fn add_resource(&mut self, name: &str, options: Options) -> ConfigResult<Options> {
        self.add(EntityKind::Resource, name, options)
    }

    /// Register `options` under `name`, deep-merging into any existing
    /// entry, and return the stored result.
    ///
    /// An action or behavior declared under a registered type identifier
    /// without a `class` takes that type as its class, on top of the type's
    /// self-described defaults.
    pub fn add(&mut self, kind: EntityKind, name: &str, options: Options) -> ConfigResult<Options> {
        let merged = match self.entries.of_mut(kind).remove(name) {
            Some(existing) => merge_options(existing, options),
            None => self.first_registration(kind, name, options)?,
        };
        self.entries
            .of_mut(kind)
            .insert(name.to_string(), merged.clone());
        tracing::trace!(kind = %kind, name, "Registered raw entry");
        Ok(merged)
    }

    fn first_registration(
        &self,
        kind: EntityKind,
        name: &str,
        options: Options,
    ) -> ConfigResult<Options> {
        let typed = matches!(kind, EntityKind::Action | EntityKind::Behavior);
        if typed && is_type_identifier(name) && !options.contains_key("class") {
            let Some(mut defaults) = self.catalog.default_options(kind, name) else {
                return Err(ConfigError::InvalidIdentifier {
                    kind,
                    key: name.to_string(),
                });
            };
            defaults.insert("class".to_string(), json!(name));
            return Ok(merge_options(defaults, options));
        }

        if !is_valid_name(&derive_name(kind, name)) {
            return Err(ConfigError::InvalidIdentifier {
                kind,
                key: name.to_string(),
            });
        }
        Ok(options)
    }

    pub fn contains(&self, kind: EntityKind, name: &str) -> bool {
        self.entries.of(kind).contains_key(name)
    }

    pub fn get(&self, kind: EntityKind, name: &str) -> Option<&Options> {
        self.entries.of(kind).get(name)
    }

    pub fn entries(&self) -> &RawEntries {
        &self.entries
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Freeze the store. No mutation API exists on the result.
    pub fn lock(self) -> FrozenConfigSource {
        tracing::debug!(entries = self.entries.len(), "Locked configuration source");
        FrozenConfigSource {
            catalog: self.catalog,
            entries: self.entries,
        }
    }
}

/// Read-only view of a locked store.
#[derive(Debug, Clone)]
pub struct FrozenConfigSource {
    catalog: Arc<TypeCatalog>,
    entries: RawEntries,
}

impl FrozenConfigSource {
    pub fn contains(&self, kind: EntityKind, name: &str) -> bool {
        self.entries.of(kind).contains_key(name)
    }

    pub fn get(&self, kind: EntityKind, name: &str) -> Option<&Options> {
        self.entries.of(kind).get(name)
    }

    pub fn names(&self, kind: EntityKind) -> impl Iterator<Item = &str> {
        self.entries.of(kind).keys().map(String::as_str)
    }

    pub fn entries(&self) -> &RawEntries {
        &self.entries
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
