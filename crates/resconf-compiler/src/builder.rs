//! Phase 1: resolve every kind independently, in dependency order.
//!
//! [`ConfigurationBuilder::build`] consumes the builder and returns a
//! [`BuiltConfiguration`]; Phase 2 ([`BuiltConfiguration::finalize`]) is only
//! reachable from there, so finalizing an unbuilt configuration cannot be
//! expressed.

use std::collections::BTreeMap;
use std::sync::Arc;

use resconf_core::types::option_str;
use resconf_core::{ConfigError, ConfigResult, EntityKind, Options, SchemaViolation, ValueType};
use resconf_schema::SchemaResolver;
use serde_json::Value;

use crate::fingerprint::fingerprint;
use crate::resolved::ResolvedSet;
use crate::source::MutableConfigSource;

/// Options on a resource whose values become resource aliases.
const RESOURCE_ALIAS_KEYS: [&str; 3] = ["entity", "interface", "translation"];

pub struct ConfigurationBuilder {
    source: MutableConfigSource,
    resolver: Arc<SchemaResolver>,
}

impl ConfigurationBuilder {
    pub fn new(source: MutableConfigSource, resolver: Arc<SchemaResolver>) -> Self {
        Self { source, resolver }
    }

    /// Run Phase 1: permissions, actions, behaviors, namespaces, resources.
    pub fn build(self) -> ConfigResult<BuiltConfiguration> {
        let fingerprint = fingerprint(self.source.entries(), &self.resolver);
        let entries = self.source.entries();
        tracing::info!(
            permissions = entries.permissions.len(),
            namespaces = entries.namespaces.len(),
            actions = entries.actions.len(),
            behaviors = entries.behaviors.len(),
            resources = entries.resources.len(),
            "Resolving configuration (phase 1)"
        );

        let permissions =
            self.resolve_plain(EntityKind::Permission, SchemaResolver::resolve_permission)?;
        let actions = self.resolve_typed(EntityKind::Action, SchemaResolver::resolve_action)?;
        let behaviors =
            self.resolve_typed(EntityKind::Behavior, SchemaResolver::resolve_behavior)?;
        let namespaces =
            self.resolve_plain(EntityKind::Namespace, SchemaResolver::resolve_namespace)?;
        let (mut resources, declared_interfaces) =
            self.resolve_resources(&namespaces, &permissions)?;
        link_parents(&mut resources)?;

        Ok(BuiltConfiguration {
            source: self.source,
            resolver: self.resolver,
            fingerprint,
            permissions,
            namespaces,
            actions,
            behaviors,
            resources,
            declared_interfaces,
        })
    }

    /// Permissions and namespaces: keyed by resolved name, raw key aliased.
    fn resolve_plain<F>(&self, kind: EntityKind, resolve: F) -> ConfigResult<ResolvedSet>
    where
        F: Fn(&SchemaResolver, &str, &Options) -> ConfigResult<Options>,
    {
        let mut set = ResolvedSet::default();
        for (key, raw) in self.source.entries().of(kind) {
            let resolved = resolve(&self.resolver, key, raw)?;
            let name = resolved_name(&resolved, key);
            set.insert(kind, &name, key, resolved)?;
            set.add_alias(kind, key, &name);
        }
        tracing::debug!(kind = %kind, count = set.len(), "Resolved kind");
        Ok(set)
    }

    /// Actions and behaviors: additionally reachable by implementing type.
    fn resolve_typed<F>(&self, kind: EntityKind, resolve: F) -> ConfigResult<ResolvedSet>
    where
        F: Fn(&SchemaResolver, &str, &Options) -> ConfigResult<Options>,
    {
        let mut set = ResolvedSet::default();
        for (key, raw) in self.source.entries().of(kind) {
            let resolved = resolve(&self.resolver, key, raw)?;
            register_typed(&mut set, kind, key, resolved)?;
        }
        tracing::debug!(kind = %kind, count = set.len(), "Resolved kind");
        Ok(set)
    }

    fn resolve_resources(
        &self,
        namespaces: &ResolvedSet,
        permissions: &ResolvedSet,
    ) -> ConfigResult<(ResolvedSet, BTreeMap<String, Vec<String>>)> {
        let mut set = ResolvedSet::default();
        let mut declared = BTreeMap::new();

        for (key, raw) in self.source.entries().resources.iter() {
            let mut raw = raw.clone();
            let interfaces = take_interfaces(key, &mut raw)?;

            let resolved = self.resolver.resolve_resource(
                key,
                &raw,
                &namespaces.configs,
                &permissions.configs,
            )?;
            let name = resolved_name(&resolved, key);
            let aliases: Vec<String> = RESOURCE_ALIAS_KEYS
                .iter()
                .filter_map(|option| option_str(&resolved, option).map(str::to_string))
                .chain(interfaces.iter().cloned())
                .collect();

            set.insert(EntityKind::Resource, &name, key, resolved)?;
            set.add_alias(EntityKind::Resource, key, &name);
            for alias in &aliases {
                set.add_alias(EntityKind::Resource, alias, &name);
            }
            if !interfaces.is_empty() {
                declared.insert(name, interfaces);
            }
        }

        tracing::debug!(kind = %EntityKind::Resource, count = set.len(), "Resolved kind");
        Ok((set, declared))
    }
}

/// Store a resolved action or behavior under its name, aliased by raw key
/// and implementing type.
pub(crate) fn register_typed(
    set: &mut ResolvedSet,
    kind: EntityKind,
    key: &str,
    resolved: Options,
) -> ConfigResult<String> {
    let name = resolved_name(&resolved, key);
    let class = option_str(&resolved, "class").map(str::to_string);
    set.insert(kind, &name, key, resolved)?;
    set.add_alias(kind, key, &name);
    if let Some(class) = class {
        set.add_alias(kind, &class, &name);
    }
    Ok(name)
}

/// Remove the raw `interfaces` list, which never reaches the resource
/// schema.
fn take_interfaces(key: &str, raw: &mut Options) -> ConfigResult<Vec<String>> {
    let Some(value) = raw.remove("interfaces") else {
        return Ok(Vec::new());
    };
    match value {
        Value::Array(items) if items.iter().all(Value::is_string) => {
            Ok(items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect())
        }
        other => Err(ConfigError::invalid(
            EntityKind::Resource,
            key,
            SchemaViolation::InvalidType {
                key: "interfaces".to_string(),
                expected: ValueType::StringList.as_str().to_string(),
                actual: ValueType::describe(&other).to_string(),
            },
        )),
    }
}

fn resolved_name(resolved: &Options, key: &str) -> String {
    option_str(resolved, "name").unwrap_or(key).to_string()
}

/// Rewrite every `parent` to its canonical resource name, rejecting
/// references to resources that do not exist.
fn link_parents(resources: &mut ResolvedSet) -> ConfigResult<()> {
    let mut rewrites = Vec::new();
    for (name, config) in &resources.configs {
        let Some(parent) = option_str(config, "parent") else {
            continue;
        };
        match resources.canonical(parent) {
            Some(canonical) if canonical != parent => {
                rewrites.push((name.clone(), canonical.to_string()));
            }
            Some(_) => {}
            None => {
                return Err(ConfigError::UnknownReference {
                    kind: EntityKind::Resource,
                    name: name.clone(),
                    reference_kind: EntityKind::Resource,
                    reference: parent.to_string(),
                });
            }
        }
    }
    for (name, parent) in rewrites {
        if let Some(config) = resources.configs.get_mut(&name) {
            config.insert("parent".to_string(), Value::String(parent));
        }
    }
    Ok(())
}

/// Output of Phase 1. Holds the still-mutable source so Phase 2 can register
/// auto-discovered types before locking it.
pub struct BuiltConfiguration {
    pub(crate) source: MutableConfigSource,
    pub(crate) resolver: Arc<SchemaResolver>,
    pub(crate) fingerprint: String,
    pub(crate) permissions: ResolvedSet,
    pub(crate) namespaces: ResolvedSet,
    pub(crate) actions: ResolvedSet,
    pub(crate) behaviors: ResolvedSet,
    pub(crate) resources: ResolvedSet,
    pub(crate) declared_interfaces: BTreeMap<String, Vec<String>>,
}

impl std::fmt::Debug for BuiltConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltConfiguration")
            .field("fingerprint", &self.fingerprint)
            .field("permissions", &self.permissions.len())
            .field("namespaces", &self.namespaces.len())
            .field("actions", &self.actions.len())
            .field("behaviors", &self.behaviors.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl BuiltConfiguration {
    pub fn permissions(&self) -> &ResolvedSet {
        &self.permissions
    }

    pub fn namespaces(&self) -> &ResolvedSet {
        &self.namespaces
    }

    pub fn actions(&self) -> &ResolvedSet {
        &self.actions
    }

    pub fn behaviors(&self) -> &ResolvedSet {
        &self.behaviors
    }

    pub fn resources(&self) -> &ResolvedSet {
        &self.resources
    }

    pub fn resolved(&self, kind: EntityKind) -> &ResolvedSet {
        match kind {
            EntityKind::Permission => &self.permissions,
            EntityKind::Namespace => &self.namespaces,
            EntityKind::Action => &self.actions,
            EntityKind::Behavior => &self.behaviors,
            EntityKind::Resource => &self.resources,
        }
    }

    /// Interfaces a resource declared in its raw `interfaces` list.
    pub fn declared_interfaces(&self, resource: &str) -> &[String] {
        self.declared_interfaces
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn resolver(&self) -> &Arc<SchemaResolver> {
        &self.resolver
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
