//! Per-kind option resolution.
//!
//! Each kind's schema is compiled once, on first use, by asking the core
//! extension and then every registered extension (in registration order) to
//! contribute. Attachment-level schemas (one action or behavior as attached
//! to a resource) are compiled per action/behavior name and cached likewise.

use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, OnceLock};

use resconf_core::naming::derive_name;
use resconf_core::types::{option_str, option_str_list};
use resconf_core::{ConfigError, ConfigResult, EntityKind, Options, OptionsSchema};

use crate::catalog::TypeCatalog;
use crate::core_extension::CoreExtension;
use crate::extension::{KindDefaults, SchemaExtension, extend_config};

#[derive(Debug)]
struct KindSchema {
    schema: OptionsSchema,
    defaults: Options,
}

type SchemaCache = Mutex<HashMap<String, Arc<OptionsSchema>>>;

pub struct SchemaResolver {
    catalog: Arc<TypeCatalog>,
    core: CoreExtension,
    extensions: Vec<Arc<dyn SchemaExtension>>,
    kind_schemas: [OnceLock<Arc<KindSchema>>; 5],
    action_schemas: SchemaCache,
    behavior_schemas: SchemaCache,
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("catalog", &self.catalog)
            .field("extensions", &self.extension_names())
            .finish()
    }
}

impl SchemaResolver {
    /// Resolver with only the core extension.
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self::with_extensions(catalog, Vec::new())
    }

    /// Resolver applying `extensions` after the core extension, in order.
    pub fn with_extensions(
        catalog: Arc<TypeCatalog>,
        extensions: Vec<Arc<dyn SchemaExtension>>,
    ) -> Self {
        Self {
            core: CoreExtension::new(Arc::clone(&catalog)),
            catalog,
            extensions,
            kind_schemas: Default::default(),
            action_schemas: Mutex::new(HashMap::new()),
            behavior_schemas: Mutex::new(HashMap::new()),
        }
    }

    /// Append an extension. Only valid before the first resolution; schemas
    /// already compiled are not rebuilt.
    pub fn with_extension<E: SchemaExtension + 'static>(mut self, extension: E) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Extension names in application order, core first.
    pub fn extension_names(&self) -> Vec<String> {
        std::iter::once(self.core.name())
            .chain(self.extensions.iter().map(|ext| ext.name()))
            .map(str::to_string)
            .collect()
    }

    fn kind_schema(&self, kind: EntityKind) -> Arc<KindSchema> {
        let slot = EntityKind::ALL
            .iter()
            .position(|candidate| *candidate == kind)
            .unwrap_or_default();
        let compiled = self.kind_schemas[slot].get_or_init(|| {
            let mut schema = OptionsSchema::new();
            let mut defaults = KindDefaults::default();
            extend_config(&self.core, kind, &mut schema, &mut defaults);
            for extension in &self.extensions {
                extend_config(extension.as_ref(), kind, &mut schema, &mut defaults);
            }
            tracing::debug!(kind = %kind, extensions = self.extensions.len() + 1, "Compiled kind schema");
            Arc::new(KindSchema {
                schema,
                defaults: defaults.into_options(),
            })
        });
        Arc::clone(compiled)
    }

    /// Kind-level defaults contributed by extensions, deep-merged in order.
    pub fn kind_defaults(&self, kind: EntityKind) -> Options {
        self.kind_schema(kind).defaults.clone()
    }

    /// Keys the compiled schema for `kind` defines.
    pub fn defined_options(&self, kind: EntityKind) -> Vec<String> {
        self.kind_schema(kind)
            .schema
            .defined_keys()
            .map(str::to_string)
            .collect()
    }

    fn resolve_kind(&self, kind: EntityKind, key: &str, raw: &Options) -> ConfigResult<Options> {
        let mut raw = raw.clone();
        if !raw.contains_key("name") {
            raw.insert("name".to_string(), json!(derive_name(kind, key)));
        }
        self.kind_schema(kind)
            .schema
            .resolve(&raw)
            .map_err(|source| ConfigError::invalid(kind, key, source))
    }

    pub fn resolve_permission(&self, key: &str, raw: &Options) -> ConfigResult<Options> {
        self.resolve_kind(EntityKind::Permission, key, raw)
    }

    pub fn resolve_namespace(&self, key: &str, raw: &Options) -> ConfigResult<Options> {
        self.resolve_kind(EntityKind::Namespace, key, raw)
    }

    pub fn resolve_action(&self, key: &str, raw: &Options) -> ConfigResult<Options> {
        self.resolve_kind(EntityKind::Action, key, raw)
    }

    pub fn resolve_behavior(&self, key: &str, raw: &Options) -> ConfigResult<Options> {
        self.resolve_kind(EntityKind::Behavior, key, raw)
    }

    /// Resolve a resource and check its namespace and declared permissions
    /// against the already-resolved namespace and permission maps.
    pub fn resolve_resource(
        &self,
        key: &str,
        raw: &Options,
        namespaces: &BTreeMap<String, Options>,
        permissions: &BTreeMap<String, Options>,
    ) -> ConfigResult<Options> {
        let resolved = self.resolve_kind(EntityKind::Resource, key, raw)?;
        let name = option_str(&resolved, "name").unwrap_or(key).to_string();

        if let Some(namespace) = option_str(&resolved, "namespace") {
            if !namespaces.contains_key(namespace) {
                return Err(ConfigError::UnknownReference {
                    kind: EntityKind::Resource,
                    name,
                    reference_kind: EntityKind::Namespace,
                    reference: namespace.to_string(),
                });
            }
        }

        for permission in option_str_list(&resolved, "permissions") {
            if !permissions.contains_key(&permission) {
                return Err(ConfigError::UnknownPermission {
                    resource: name,
                    permission,
                });
            }
        }

        Ok(resolved)
    }

    /// Resolve the options a resource attaches to `action_name`, against the
    /// schema contributed by the core extension, the action's implementing
    /// type, and every registered extension.
    pub fn resolve_action_options(
        &self,
        resource: &str,
        action_name: &str,
        action: &Options,
        raw: &Options,
    ) -> ConfigResult<Options> {
        let schema = cached_schema(&self.action_schemas, action_name, || {
            let mut schema = OptionsSchema::new();
            self.core.extend_action_options(&mut schema, action);
            if let Some(definition) = option_str(action, "class").and_then(|c| self.catalog.action(c)) {
                definition.configurable().configure_options(&mut schema);
            }
            for extension in &self.extensions {
                extension.extend_action_options(&mut schema, action);
            }
            schema
        });
        schema
            .resolve(raw)
            .map_err(|source| ConfigError::AttachmentInvalid {
                resource: resource.to_string(),
                kind: EntityKind::Action,
                name: action_name.to_string(),
                source,
            })
    }

    /// Resolve the options a resource attaches to `behavior_name`.
    pub fn resolve_behavior_options(
        &self,
        resource: &str,
        behavior_name: &str,
        behavior: &Options,
        raw: &Options,
    ) -> ConfigResult<Options> {
        let schema = cached_schema(&self.behavior_schemas, behavior_name, || {
            let mut schema = OptionsSchema::new();
            self.core.extend_behavior_options(&mut schema, behavior);
            if let Some(behavior_type) =
                option_str(behavior, "class").and_then(|c| self.catalog.behavior(c))
            {
                behavior_type.configure_options(&mut schema);
            }
            for extension in &self.extensions {
                extension.extend_behavior_options(&mut schema, behavior);
            }
            schema
        });
        schema
            .resolve(raw)
            .map_err(|source| ConfigError::AttachmentInvalid {
                resource: resource.to_string(),
                kind: EntityKind::Behavior,
                name: behavior_name.to_string(),
                source,
            })
    }
}

fn cached_schema<F>(cache: &SchemaCache, name: &str, build: F) -> Arc<OptionsSchema>
where
    F: FnOnce() -> OptionsSchema,
{
    let mut schemas = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(schema) = schemas.get(name) {
        return Arc::clone(schema);
    }
    let schema = Arc::new(build());
    schemas.insert(name.to_string(), Arc::clone(&schema));
    schema
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
