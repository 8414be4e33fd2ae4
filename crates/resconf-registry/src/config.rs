//! Typed configuration values handed out by registries.
//!
//! Each value is built from a fully resolved option map. Keys contributed by
//! extensions that a struct does not name land in its `extra` map.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use resconf_core::{ConfigError, ConfigResult, EntityKind, Operation, Options};

/// A typed view over one resolved entry.
pub trait EntityConfig: DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn name(&self) -> &str;

    fn from_options(name: &str, options: &Options) -> ConfigResult<Self> {
        serde_json::from_value(Value::Object(options.clone())).map_err(|err| {
            ConfigError::Construct {
                kind: Self::KIND,
                name: name.to_string(),
                reason: err.to_string(),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionConfig {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub translation_domain: Option<String>,
    #[serde(flatten)]
    pub extra: Options,
}

impl EntityConfig for PermissionConfig {
    const KIND: EntityKind = EntityKind::Permission;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub name: String,
    pub prefix: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub translation_domain: Option<String>,
    #[serde(flatten)]
    pub extra: Options,
}

impl EntityConfig for NamespaceConfig {
    const KIND: EntityKind = EntityKind::Namespace;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub button: Option<Value>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Options,
}

impl EntityConfig for ActionConfig {
    const KIND: EntityKind = EntityKind::Action;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub options: Options,
    #[serde(flatten)]
    pub extra: Options,
}

impl BehaviorConfig {
    pub fn participates_in(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}

impl EntityConfig for BehaviorConfig {
    const KIND: EntityKind = EntityKind::Behavior;

    fn name(&self) -> &str {
        &self.name
    }
}

pub type Children = BTreeMap<String, Arc<ResourceConfig>>;

type ChildrenFn = dyn Fn(&ResourceConfig) -> ConfigResult<Children> + Send + Sync;

/// Computes a resource's children on demand. Not part of the value: two
/// configs compare equal regardless of accessor.
#[derive(Clone)]
pub struct ChildrenAccessor(Arc<ChildrenFn>);

impl ChildrenAccessor {
    pub fn new<F>(accessor: F) -> Self
    where
        F: Fn(&ResourceConfig) -> ConfigResult<Children> + Send + Sync + 'static,
    {
        Self(Arc::new(accessor))
    }
}

impl std::fmt::Debug for ChildrenAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChildrenAccessor")
    }
}

impl PartialEq for ChildrenAccessor {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub driver: String,
    pub namespace: String,
    pub entity: String,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub translatable_fields: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub translation_domain: Option<String>,
    #[serde(default)]
    pub actions: BTreeMap<String, Options>,
    #[serde(default)]
    pub behaviors: BTreeMap<String, Options>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub event_class: Option<String>,
    #[serde(default)]
    pub event_priority: i64,
    #[serde(default)]
    pub options: Options,
    #[serde(flatten)]
    pub extra: Options,
    #[serde(skip)]
    children: Option<ChildrenAccessor>,
}

impl ResourceConfig {
    pub fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    pub fn action(&self, action: &str) -> Option<&Options> {
        self.actions.get(action)
    }

    pub fn has_behavior(&self, behavior: &str) -> bool {
        self.behaviors.contains_key(behavior)
    }

    pub fn behavior(&self, behavior: &str) -> Option<&Options> {
        self.behaviors.get(behavior)
    }

    pub fn is_translatable(&self) -> bool {
        self.translation.is_some()
    }

    pub(crate) fn bind_children(&mut self, accessor: ChildrenAccessor) {
        self.children = Some(accessor);
    }

    /// Resources whose parent is this one, computed fresh on every call. A
    /// config not handed out by a registry has no children.
    pub fn children(&self) -> ConfigResult<Children> {
        match &self.children {
            Some(accessor) => (accessor.0)(self),
            None => Ok(Children::new()),
        }
    }
}

impl EntityConfig for ResourceConfig {
    const KIND: EntityKind = EntityKind::Resource;

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_permission_keeps_extension_keys() {
        let config = PermissionConfig::from_options(
            "read",
            &obj(json!({"name": "read", "label": "Read", "group": "content"})),
        )
        .unwrap();

        assert_eq!(config.label, "Read");
        assert_eq!(config.translation_domain, None);
        assert_eq!(config.extra["group"], json!("content"));
    }

    #[test]
    fn test_behavior_operations_are_typed() {
        let config = BehaviorConfig::from_options(
            "audit",
            &obj(json!({
                "name": "audit",
                "class": "acme::behavior::AuditBehavior",
                "interface": "acme::Auditable",
                "operations": ["create", "update"],
                "options": {},
            })),
        )
        .unwrap();

        assert!(config.participates_in(Operation::Create));
        assert!(!config.participates_in(Operation::Delete));
    }

    #[test]
    fn test_construct_error_names_entry() {
        let err = ResourceConfig::from_options("acme.post", &obj(json!({"name": "acme.post"})))
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Construct { kind: EntityKind::Resource, ref name, .. } if name == "acme.post"
        ));
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_unbound_resource_has_no_children() {
        let config = ResourceConfig::from_options(
            "acme.post",
            &obj(json!({
                "name": "acme.post",
                "driver": "orm",
                "namespace": "acme",
                "entity": "acme::Post",
                "event_priority": 5,
            })),
        )
        .unwrap();

        assert!(config.children().unwrap().is_empty());
        assert_eq!(config.event_priority, 5);
        assert!(!config.is_translatable());
    }
}
