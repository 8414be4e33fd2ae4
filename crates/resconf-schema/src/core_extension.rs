//! Baseline schema every kind gets regardless of registered extensions.

use serde_json::{Value, json};
use std::sync::Arc;

use resconf_core::naming::{humanize, is_valid_name, normalize_name};
use resconf_core::types::{option_object, option_str};
use resconf_core::{Operation, Options, OptionsSchema, ValueType};

use crate::catalog::TypeCatalog;
use crate::extension::{KindDefaults, SchemaExtension};

/// Driver assumed when a resource does not name one.
pub const DEFAULT_DRIVER: &str = "orm";

const NULLABLE_STRING: &[ValueType] = &[ValueType::Null, ValueType::String];

pub struct CoreExtension {
    catalog: Arc<TypeCatalog>,
}

impl CoreExtension {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog }
    }
}

impl SchemaExtension for CoreExtension {
    fn name(&self) -> &str {
        "core"
    }

    fn extend_permission_config(&self, schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {
        define_name(schema);
        schema
            .set_default_with("label", humanized_name)
            .set_allowed_types("label", &[ValueType::String])
            .set_default("translation_domain", Value::Null)
            .set_allowed_types("translation_domain", NULLABLE_STRING);
    }

    fn extend_namespace_config(&self, schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {
        define_name(schema);
        schema
            .set_default_with("prefix", |options| {
                option_str(options, "name").map(|name| json!(format!("/{}", name.replace('.', "/"))))
            })
            .set_allowed_types("prefix", &[ValueType::String])
            .add_normalizer("prefix", normalize_prefix)
            .set_default("label", Value::Null)
            .set_allowed_types("label", NULLABLE_STRING)
            .set_default("translation_domain", Value::Null)
            .set_allowed_types("translation_domain", NULLABLE_STRING);
    }

    fn extend_action_config(&self, schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {
        define_name(schema);
        let catalog = Arc::clone(&self.catalog);
        schema
            .set_required("class")
            .set_allowed_types("class", &[ValueType::String])
            .add_allowed_predicate("class", "a registered action type", move |value| {
                value.as_str().is_some_and(|class| catalog.action(class).is_some())
            })
            .set_default("route", Value::Null)
            .set_allowed_types("route", NULLABLE_STRING)
            .set_default("permissions", json!([]))
            .set_allowed_types("permissions", &[ValueType::StringList])
            .add_normalizer("permissions", normalize_name_list)
            .set_default("options", json!({}))
            .set_allowed_types("options", &[ValueType::Object])
            .set_default("button", Value::Null)
            .set_allowed_types("button", &[ValueType::Null, ValueType::Object])
            .set_default_with("label", humanized_name)
            .set_allowed_types("label", NULLABLE_STRING);
    }

    fn extend_behavior_config(&self, schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {
        define_name(schema);
        let class_catalog = Arc::clone(&self.catalog);
        let interface_catalog = Arc::clone(&self.catalog);
        let operations_catalog = Arc::clone(&self.catalog);
        schema
            .set_required("class")
            .set_allowed_types("class", &[ValueType::String])
            .add_allowed_predicate("class", "a registered behavior type", move |value| {
                value
                    .as_str()
                    .is_some_and(|class| class_catalog.behavior(class).is_some())
            })
            .set_required("interface")
            .set_allowed_types("interface", NULLABLE_STRING)
            .set_default_with("interface", move |options| {
                type_default(&interface_catalog, options, "interface", Value::Null)
            })
            .set_required("operations")
            .set_allowed_types("operations", &[ValueType::StringList])
            .set_default_with("operations", move |options| {
                type_default(&operations_catalog, options, "operations", json!([]))
            })
            .add_allowed_predicate("operations", "a list of known operations", |value| {
                value.as_array().is_some_and(|ops| {
                    ops.iter()
                        .all(|op| op.as_str().and_then(Operation::parse).is_some())
                })
            })
            .add_normalizer("operations", dedup_list)
            .set_default("options", json!({}))
            .set_allowed_types("options", &[ValueType::Object]);
    }

    fn extend_resource_config(&self, schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {
        define_name(schema);
        schema
            .set_required("driver")
            .set_default("driver", json!(DEFAULT_DRIVER))
            .set_allowed_types("driver", &[ValueType::String])
            .set_required("namespace")
            .set_allowed_types("namespace", &[ValueType::String])
            .add_normalizer("namespace", normalize_name_value)
            .set_required("entity")
            .set_allowed_types("entity", &[ValueType::String])
            .set_default("interface", Value::Null)
            .set_allowed_types("interface", NULLABLE_STRING)
            .set_default("parent", Value::Null)
            .set_allowed_types("parent", NULLABLE_STRING)
            .set_default("translation", Value::Null)
            .set_allowed_types("translation", NULLABLE_STRING)
            .set_default("translatable_fields", json!([]))
            .set_allowed_types("translatable_fields", &[ValueType::StringList])
            .set_default("label", Value::Null)
            .set_allowed_types("label", NULLABLE_STRING)
            .set_default("translation_domain", Value::Null)
            .set_allowed_types("translation_domain", NULLABLE_STRING)
            .set_default("actions", json!({}))
            .set_allowed_types("actions", &[ValueType::Object, ValueType::StringList])
            .add_normalizer("actions", normalize_attachments)
            .set_default("behaviors", json!({}))
            .set_allowed_types("behaviors", &[ValueType::Object, ValueType::StringList])
            .add_normalizer("behaviors", normalize_attachments)
            .set_default("permissions", json!([]))
            .set_allowed_types("permissions", &[ValueType::StringList])
            .add_normalizer("permissions", normalize_name_list)
            .set_default("event_class", Value::Null)
            .set_allowed_types("event_class", NULLABLE_STRING)
            .set_default("event_priority", json!(0))
            .set_allowed_types("event_priority", &[ValueType::Integer])
            .set_default("options", json!({}))
            .set_allowed_types("options", &[ValueType::Object]);
    }

    fn extend_action_options(&self, schema: &mut OptionsSchema, action: &Options) {
        for key in ["route", "button", "label"] {
            schema.set_default(key, action.get(key).cloned().unwrap_or(Value::Null));
        }
        schema
            .set_allowed_types("route", NULLABLE_STRING)
            .set_allowed_types("button", &[ValueType::Null, ValueType::Object])
            .set_allowed_types("label", NULLABLE_STRING)
            .set_default(
                "permissions",
                action.get("permissions").cloned().unwrap_or_else(|| json!([])),
            )
            .set_allowed_types("permissions", &[ValueType::StringList])
            .add_normalizer("permissions", normalize_name_list);
        for (key, value) in option_object(action, "options") {
            schema.set_default(&key, value);
        }
    }

    fn extend_behavior_options(&self, schema: &mut OptionsSchema, behavior: &Options) {
        for (key, value) in option_object(behavior, "options") {
            schema.set_default(&key, value);
        }
    }
}

fn define_name(schema: &mut OptionsSchema) {
    schema
        .set_required("name")
        .set_allowed_types("name", &[ValueType::String])
        .add_normalizer("name", normalize_name_value);
}

fn humanized_name(options: &Options) -> Option<Value> {
    option_str(options, "name").map(|name| json!(humanize(&normalize_name(name))))
}

/// Default taken from the behavior type's self-described options. An
/// unregistered class yields `fallback` so the class check reports it.
fn type_default(
    catalog: &TypeCatalog,
    options: &Options,
    key: &str,
    fallback: Value,
) -> Option<Value> {
    let class = option_str(options, "class")?;
    match catalog.behavior(class) {
        Some(behavior) => behavior.default_options().get(key).cloned(),
        None => Some(fallback),
    }
}

fn normalize_name_str(raw: &str) -> Result<String, String> {
    let name = normalize_name(raw);
    if is_valid_name(&name) {
        Ok(name)
    } else {
        Err(format!("'{raw}' does not normalize to a valid name"))
    }
}

fn normalize_name_value(_: &Options, value: Value) -> Result<Value, String> {
    match value.as_str() {
        Some(raw) => normalize_name_str(raw).map(Value::String),
        None => Ok(value),
    }
}

/// Normalize every name in a list, dropping duplicates but keeping order.
fn normalize_name_list(_: &Options, value: Value) -> Result<Value, String> {
    let Value::Array(items) = value else {
        return Ok(value);
    };
    let mut names: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        let normalized = match item.as_str() {
            Some(raw) => Value::String(normalize_name_str(raw)?),
            None => item,
        };
        if !names.contains(&normalized) {
            names.push(normalized);
        }
    }
    Ok(Value::Array(names))
}

fn dedup_list(_: &Options, value: Value) -> Result<Value, String> {
    let Value::Array(items) = value else {
        return Ok(value);
    };
    let mut unique: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    Ok(Value::Array(unique))
}

fn normalize_prefix(_: &Options, value: Value) -> Result<Value, String> {
    let Some(raw) = value.as_str() else {
        return Ok(value);
    };
    let trimmed = raw.trim().trim_matches('/');
    Ok(json!(format!("/{trimmed}")))
}

/// Attachments accept `["a", "b"]` or `{a: {...}, b: null}`; both become a
/// map of option bags.
fn normalize_attachments(_: &Options, value: Value) -> Result<Value, String> {
    match value {
        Value::Array(items) => {
            let mut map = Options::new();
            for item in items {
                if let Value::String(name) = item {
                    map.insert(name, json!({}));
                }
            }
            Ok(Value::Object(map))
        }
        Value::Object(entries) => {
            let mut map = Options::new();
            for (name, options) in entries {
                match options {
                    Value::Null => {
                        map.insert(name, json!({}));
                    }
                    Value::Object(_) => {
                        map.insert(name, options);
                    }
                    other => {
                        return Err(format!(
                            "options for '{name}' must be a map or null, got {}",
                            ValueType::describe(&other)
                        ));
                    }
                }
            }
            Ok(Value::Object(map))
        }
        other => Ok(other),
    }
}
