//! Phase 2: cross-kind resolution over the Phase 1 output.
//!
//! Steps run in a fixed order, each over every resource before the next
//! starts: behavior normalization, behavior option resolution, interface
//! auto-attachment, action resolution (normalize, expand builders, resolve,
//! behavior contributions), permission propagation. The source is locked
//! once all steps succeed.

use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;

use resconf_core::types::{option_object, option_str, option_str_list};
use resconf_core::{
    ActionMap, ConfigError, ConfigResult, EntityKind, Options, fill_missing, merge_options,
};
use resconf_schema::{ActionBuilder, SchemaResolver};

use crate::builder::{BuiltConfiguration, register_typed};
use crate::compiled::{CompiledConfiguration, FORMAT_VERSION};
use crate::resolved::ResolvedSet;

impl BuiltConfiguration {
    /// Run Phase 2 and lock the source. Any failure aborts the compile.
    pub fn finalize(mut self) -> ConfigResult<CompiledConfiguration> {
        let names: Vec<String> = self.resources.configs.keys().cloned().collect();
        tracing::info!(resources = names.len(), "Finalizing configuration (phase 2)");

        for name in &names {
            self.normalize_attachments(name, EntityKind::Behavior)?;
        }
        for name in &names {
            self.resolve_behavior_attachments(name)?;
        }
        for name in &names {
            self.auto_attach_behaviors(name)?;
        }
        for name in &names {
            self.normalize_attachments(name, EntityKind::Action)?;
            self.expand_action_builders(name)?;
            self.resolve_action_attachments(name)?;
            self.apply_behavior_actions(name)?;
        }
        for name in &names {
            self.propagate_permissions(name)?;
        }

        Ok(self.into_compiled())
    }

    fn into_compiled(self) -> CompiledConfiguration {
        let defaults = EntityKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), self.resolver.kind_defaults(*kind)))
            .collect();
        let compiled = CompiledConfiguration {
            format_version: FORMAT_VERSION,
            fingerprint: self.fingerprint,
            compiled_at: chrono::Utc::now(),
            permissions: self.permissions,
            namespaces: self.namespaces,
            actions: self.actions,
            behaviors: self.behaviors,
            resources: self.resources,
            defaults,
            source: Some(self.source.lock()),
        };
        tracing::info!(
            fingerprint = %compiled.fingerprint,
            actions = compiled.actions.len(),
            behaviors = compiled.behaviors.len(),
            "Configuration compiled"
        );
        compiled
    }

    fn resource(&self, name: &str) -> Options {
        self.resources.configs.get(name).cloned().unwrap_or_default()
    }

    fn store_resource(&mut self, name: &str, config: Options) {
        self.resources.configs.insert(name.to_string(), config);
    }

    fn typed(&self, kind: EntityKind) -> &ResolvedSet {
        match kind {
            EntityKind::Action => &self.actions,
            _ => &self.behaviors,
        }
    }

    fn typed_mut(&mut self, kind: EntityKind) -> &mut ResolvedSet {
        match kind {
            EntityKind::Action => &mut self.actions,
            _ => &mut self.behaviors,
        }
    }

    /// Resolved kind-level config of an attached action or behavior.
    fn attached_config(&self, kind: EntityKind, resource: &str, name: &str) -> ConfigResult<Options> {
        self.typed(kind)
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_reference(resource, kind, name))
    }

    /// Canonical name for an attachment key. A key naming a loadable type
    /// that no entry declared is registered on the fly.
    fn canonical_or_discover(
        &mut self,
        kind: EntityKind,
        resource: &str,
        key: &str,
    ) -> ConfigResult<String> {
        if let Some(canonical) = self.typed(kind).canonical(key).map(str::to_string) {
            return Ok(canonical);
        }
        if !self.resolver.catalog().has_type(kind, key) {
            return Err(unknown_reference(resource, kind, key));
        }

        let raw = self.source.add(kind, key, Options::new())?;
        let resolved = match kind {
            EntityKind::Action => self.resolver.resolve_action(key, &raw)?,
            _ => self.resolver.resolve_behavior(key, &raw)?,
        };
        let name = register_typed(self.typed_mut(kind), kind, key, resolved)?;
        tracing::debug!(kind = %kind, resource, type_name = key, name = %name, "Auto-discovered implementing type");
        Ok(name)
    }

    /// Steps 1 and 4a: rewrite attachment keys to canonical names.
    fn normalize_attachments(&mut self, name: &str, kind: EntityKind) -> ConfigResult<()> {
        let mut config = self.resource(name);
        let mut normalized = ActionMap::new();
        for (key, options) in attachments(&config, kind) {
            let canonical = self.canonical_or_discover(kind, name, &key)?;
            let merged = match normalized.remove(&canonical) {
                Some(existing) => merge_options(existing, options),
                None => options,
            };
            normalized.insert(canonical, merged);
        }
        set_attachments(&mut config, kind, &normalized);
        self.store_resource(name, config);
        Ok(())
    }

    /// Step 2: resolve each attached behavior's options against its own schema.
    fn resolve_behavior_attachments(&mut self, name: &str) -> ConfigResult<()> {
        let mut config = self.resource(name);
        let mut resolved = ActionMap::new();
        for (behavior, options) in attachments(&config, EntityKind::Behavior) {
            let behavior_config = self.attached_config(EntityKind::Behavior, name, &behavior)?;
            let options =
                self.resolver
                    .resolve_behavior_options(name, &behavior, &behavior_config, &options)?;
            resolved.insert(behavior, options);
        }
        set_attachments(&mut config, EntityKind::Behavior, &resolved);
        self.store_resource(name, config);
        Ok(())
    }

    /// Interfaces a resource counts as implementing: its entity type's
    /// catalog capabilities, its `interface` option and declared interfaces.
    fn capabilities(&self, name: &str, config: &Options) -> BTreeSet<String> {
        let catalog = self.resolver.catalog();
        let mut capabilities = option_str(config, "entity")
            .map(|entity| catalog.capabilities_of(entity))
            .unwrap_or_default();

        let declared = option_str(config, "interface")
            .map(str::to_string)
            .into_iter()
            .chain(self.declared_interfaces(name).iter().cloned());
        for interface in declared {
            capabilities.extend(catalog.capabilities_of(&interface));
            capabilities.insert(interface);
        }
        capabilities
    }

    /// Step 3: attach every behavior whose capability interface the resource
    /// implements, unless it already declares that behavior.
    fn auto_attach_behaviors(&mut self, name: &str) -> ConfigResult<()> {
        let mut config = self.resource(name);
        let entity = option_str(&config, "entity").unwrap_or_default().to_string();
        let capabilities = self.capabilities(name, &config);
        let mut attached = attachments(&config, EntityKind::Behavior);

        for (behavior, behavior_config) in &self.behaviors.configs {
            let Some(interface) = option_str(behavior_config, "interface") else {
                continue;
            };
            if attached.contains_key(behavior) || !capabilities.contains(interface) {
                continue;
            }
            let options = self
                .resolver
                .resolve_behavior_options(name, behavior, behavior_config, &Options::new())
                .map_err(|err| ConfigError::AutoAttach {
                    resource: name.to_string(),
                    entity: entity.clone(),
                    interface: interface.to_string(),
                    behavior: behavior.clone(),
                    reason: violation_reason(err),
                })?;
            tracing::debug!(resource = name, behavior = %behavior, interface, "Auto-attached behavior");
            attached.insert(behavior.clone(), options);
        }

        set_attachments(&mut config, EntityKind::Behavior, &attached);
        self.store_resource(name, config);
        Ok(())
    }

    /// Step 4b: replace every attached builder with the actions it emits.
    /// Entries already attached take precedence over generated ones.
    fn expand_action_builders(&mut self, name: &str) -> ConfigResult<()> {
        let resolver = Arc::clone(&self.resolver);
        let mut config = self.resource(name);
        let mut working = ActionMap::new();
        let mut builders = Vec::new();

        for (action, options) in attachments(&config, EntityKind::Action) {
            let action_config = self.attached_config(EntityKind::Action, name, &action)?;
            match builder_of(&resolver, &action_config) {
                Some(builder) => builders.push((action, action_config, options, builder)),
                None => {
                    working.insert(action, options);
                }
            }
        }

        for (action, action_config, options, builder) in builders {
            let builder_options =
                resolver.resolve_action_options(name, &action, &action_config, &options)?;
            set_attachments(&mut config, EntityKind::Action, &working);
            let generated = builder.build_actions(&resolver, &config, &builder_options)?;
            tracing::debug!(
                resource = name,
                builder = %action,
                generated = generated.len(),
                "Expanded action builder"
            );

            for (generated_name, generated_options) in generated {
                let canonical = self.canonical_or_discover(EntityKind::Action, name, &generated_name)?;
                self.reject_nested_builder(name, &action, &canonical)?;
                if working.contains_key(&canonical) {
                    tracing::trace!(resource = name, action = %canonical, "Explicit action overrides generated one");
                    continue;
                }
                working.insert(canonical, generated_options);
            }
        }

        set_attachments(&mut config, EntityKind::Action, &working);
        self.store_resource(name, config);
        Ok(())
    }

    fn reject_nested_builder(&self, resource: &str, origin: &str, action: &str) -> ConfigResult<()> {
        let action_config = self.attached_config(EntityKind::Action, resource, action)?;
        if builder_of(&self.resolver, &action_config).is_some() {
            return Err(ConfigError::Expansion {
                kind: EntityKind::Action,
                name: origin.to_string(),
                reason: format!(
                    "generated action '{action}' on resource '{resource}' is itself a builder"
                ),
            });
        }
        Ok(())
    }

    /// Step 4c: resolve every plain action against its own option schema.
    fn resolve_action_attachments(&mut self, name: &str) -> ConfigResult<()> {
        let mut config = self.resource(name);
        let mut resolved = ActionMap::new();
        for (action, options) in attachments(&config, EntityKind::Action) {
            let action_config = self.attached_config(EntityKind::Action, name, &action)?;
            let options = self
                .resolver
                .resolve_action_options(name, &action, &action_config, &options)?;
            resolved.insert(action, options);
        }
        set_attachments(&mut config, EntityKind::Action, &resolved);
        self.store_resource(name, config);
        Ok(())
    }

    /// Step 4d: let attached behaviors contribute actions. Contributed
    /// options only fill gaps in an already-resolved action.
    fn apply_behavior_actions(&mut self, name: &str) -> ConfigResult<()> {
        let resolver = Arc::clone(&self.resolver);
        let mut config = self.resource(name);
        let mut actions = attachments(&config, EntityKind::Action);

        for (behavior, options) in attachments(&config, EntityKind::Behavior) {
            let behavior_config = self.attached_config(EntityKind::Behavior, name, &behavior)?;
            let Some(behavior_type) = option_str(&behavior_config, "class")
                .and_then(|class| resolver.catalog().behavior(class))
                .cloned()
            else {
                continue;
            };

            let contributed = behavior_type.build_actions(&actions, &config, &options)?;
            for (action, contributed_options) in contributed {
                let canonical = self.canonical_or_discover(EntityKind::Action, name, &action)?;
                self.reject_nested_builder(name, &behavior, &canonical)?;
                let action_config = self.attached_config(EntityKind::Action, name, &canonical)?;
                let raw = match actions.remove(&canonical) {
                    Some(existing) => fill_missing(existing, contributed_options),
                    None => contributed_options,
                };
                let resolved =
                    resolver.resolve_action_options(name, &canonical, &action_config, &raw)?;
                tracing::debug!(resource = name, behavior = %behavior, action = %canonical, "Behavior contributed action");
                actions.insert(canonical, resolved);
            }
            set_attachments(&mut config, EntityKind::Action, &actions);
        }

        set_attachments(&mut config, EntityKind::Action, &actions);
        self.store_resource(name, config);
        Ok(())
    }

    /// Step 5: lift every action's required permissions onto the resource.
    fn propagate_permissions(&mut self, name: &str) -> ConfigResult<()> {
        let mut config = self.resource(name);
        let mut permissions = option_str_list(&config, "permissions");

        for options in attachments(&config, EntityKind::Action).values() {
            for permission in option_str_list(options, "permissions") {
                let Some(canonical) = self.permissions.canonical(&permission) else {
                    return Err(ConfigError::UnknownPermission {
                        resource: name.to_string(),
                        permission,
                    });
                };
                if !permissions.iter().any(|existing| existing == canonical) {
                    permissions.push(canonical.to_string());
                }
            }
        }

        config.insert("permissions".to_string(), json!(permissions));
        self.store_resource(name, config);
        Ok(())
    }
}

fn attachment_key(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Action => "actions",
        _ => "behaviors",
    }
}

fn attachments(config: &Options, kind: EntityKind) -> ActionMap {
    option_object(config, attachment_key(kind))
        .into_iter()
        .map(|(name, options)| (name, options.as_object().cloned().unwrap_or_default()))
        .collect()
}

fn set_attachments(config: &mut Options, kind: EntityKind, attached: &ActionMap) {
    let value: Options = attached
        .iter()
        .map(|(name, options)| (name.clone(), Value::Object(options.clone())))
        .collect();
    config.insert(attachment_key(kind).to_string(), Value::Object(value));
}

fn builder_of(resolver: &SchemaResolver, action_config: &Options) -> Option<Arc<dyn ActionBuilder>> {
    option_str(action_config, "class")
        .and_then(|class| resolver.catalog().action(class))
        .and_then(|definition| definition.as_builder())
        .cloned()
}

fn unknown_reference(resource: &str, kind: EntityKind, reference: &str) -> ConfigError {
    ConfigError::UnknownReference {
        kind: EntityKind::Resource,
        name: resource.to_string(),
        reference_kind: kind,
        reference: reference.to_string(),
    }
}

/// The schema-level reason behind an attachment failure.
fn violation_reason(err: ConfigError) -> String {
    match err {
        ConfigError::AttachmentInvalid { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "finalize_tests.rs"]
mod tests;
