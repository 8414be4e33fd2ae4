use std::sync::Arc;

use resconf_compiler::CompiledConfiguration;
use resconf_core::{ConfigResult, EntityKind};

use crate::config::{ActionConfig, BehaviorConfig, NamespaceConfig, PermissionConfig};
use crate::registry::Registry;
use crate::resource_registry::ResourceRegistry;

/// One registry per entity kind, built from a single compile.
#[derive(Debug)]
pub struct Registries {
    pub permissions: Registry<PermissionConfig>,
    pub namespaces: Registry<NamespaceConfig>,
    pub actions: Registry<ActionConfig>,
    pub behaviors: Registry<BehaviorConfig>,
    pub resources: Arc<ResourceRegistry>,
    fingerprint: String,
}

impl Registries {
    pub fn from_compiled(compiled: &CompiledConfiguration) -> Self {
        let registry = |kind: EntityKind| {
            (
                compiled.resolved(kind).clone(),
                compiled.kind_defaults(kind),
            )
        };
        let (permissions, permission_defaults) = registry(EntityKind::Permission);
        let (namespaces, namespace_defaults) = registry(EntityKind::Namespace);
        let (actions, action_defaults) = registry(EntityKind::Action);
        let (behaviors, behavior_defaults) = registry(EntityKind::Behavior);
        let (resources, resource_defaults) = registry(EntityKind::Resource);

        Self {
            permissions: Registry::new(permissions, permission_defaults),
            namespaces: Registry::new(namespaces, namespace_defaults),
            actions: Registry::new(actions, action_defaults),
            behaviors: Registry::new(behaviors, behavior_defaults),
            resources: ResourceRegistry::new(resources, resource_defaults),
            fingerprint: compiled.fingerprint.clone(),
        }
    }

    /// Fingerprint of the inputs these registries were compiled from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Construct every config of every kind. Returns the total count.
    pub fn warm_up(&self) -> ConfigResult<usize> {
        let count = self.permissions.warm_up()?
            + self.namespaces.warm_up()?
            + self.actions.warm_up()?
            + self.behaviors.warm_up()?
            + self.resources.warm_up()?;
        tracing::info!(count, "Registries warmed up");
        Ok(count)
    }
}
