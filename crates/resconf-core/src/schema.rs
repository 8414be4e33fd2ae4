//! Option schema: defined keys, requiredness, defaults, type and value
//! constraints, and normalizers.
//!
//! Extensions contribute to a schema additively. Static object defaults set
//! twice are deep-merged; requiredness is the union of every contribution.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::SchemaViolation;
use crate::merge::merge_values;
use crate::types::Options;

type LazyDefault = Arc<dyn Fn(&Options) -> Option<Value> + Send + Sync>;
type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
type Normalizer = Arc<dyn Fn(&Options, Value) -> Result<Value, String> + Send + Sync>;

/// JSON-level type accepted by an option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Null,
    Bool,
    Integer,
    Number,
    String,
    Array,
    /// Array whose every element is a string.
    StringList,
    Object,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "int",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::StringList => "string[]",
            Self::Object => "object",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::Object => value.is_object(),
        }
    }

    /// Name of the type `value` actually has, for error messages.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_f64() => "number",
            Value::Number(_) => "int",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

#[derive(Clone)]
enum DefaultValue {
    Static(Value),
    Lazy(LazyDefault),
}

#[derive(Clone)]
enum AllowedValue {
    Exact(Value),
    Matching {
        description: String,
        predicate: Predicate,
    },
}

impl AllowedValue {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Exact(expected) => expected == value,
            Self::Matching { predicate, .. } => predicate(value),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Exact(expected) => expected.to_string(),
            Self::Matching { description, .. } => description.clone(),
        }
    }
}

#[derive(Clone, Default)]
pub struct OptionsSchema {
    defined: BTreeSet<String>,
    required: BTreeSet<String>,
    defaults: BTreeMap<String, DefaultValue>,
    allowed_types: BTreeMap<String, Vec<ValueType>>,
    allowed_values: BTreeMap<String, Vec<AllowedValue>>,
    normalizers: BTreeMap<String, Vec<Normalizer>>,
    allow_undefined: bool,
}

impl std::fmt::Debug for OptionsSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsSchema")
            .field("defined", &self.defined)
            .field("required", &self.required)
            .field("defaults", &self.defaults.keys().collect::<Vec<_>>())
            .field("allow_undefined", &self.allow_undefined)
            .finish()
    }
}

impl OptionsSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, key: &str) -> &mut Self {
        self.defined.insert(key.to_string());
        self
    }

    /// Mark `key` as required. A default (static or lazy) satisfies it.
    pub fn set_required(&mut self, key: &str) -> &mut Self {
        self.define(key);
        self.required.insert(key.to_string());
        self
    }

    /// Set a static default. When both the previous and the new default are
    /// objects they are deep-merged, the new one winning per key.
    pub fn set_default(&mut self, key: &str, value: Value) -> &mut Self {
        self.define(key);
        let merged = match self.defaults.remove(key) {
            Some(DefaultValue::Static(previous)) => merge_values(previous, value),
            _ => value,
        };
        self.defaults
            .insert(key.to_string(), DefaultValue::Static(merged));
        self
    }

    /// Set a default computed from the other options. Returning `None`
    /// leaves the option unset.
    ///
    /// Every lazy default sees the raw options plus static defaults, never
    /// the output of another lazy default.
    pub fn set_default_with<F>(&mut self, key: &str, default: F) -> &mut Self
    where
        F: Fn(&Options) -> Option<Value> + Send + Sync + 'static,
    {
        self.define(key);
        self.defaults
            .insert(key.to_string(), DefaultValue::Lazy(Arc::new(default)));
        self
    }

    pub fn set_allowed_types(&mut self, key: &str, types: &[ValueType]) -> &mut Self {
        self.define(key);
        self.allowed_types.insert(key.to_string(), types.to_vec());
        self
    }

    pub fn add_allowed_types(&mut self, key: &str, types: &[ValueType]) -> &mut Self {
        self.define(key);
        let entry = self.allowed_types.entry(key.to_string()).or_default();
        for ty in types {
            if !entry.contains(ty) {
                entry.push(*ty);
            }
        }
        self
    }

    pub fn set_allowed_values(&mut self, key: &str, values: Vec<Value>) -> &mut Self {
        self.define(key);
        self.allowed_values.insert(
            key.to_string(),
            values.into_iter().map(AllowedValue::Exact).collect(),
        );
        self
    }

    /// Accept values matching `predicate`, alongside any already-allowed values.
    pub fn add_allowed_predicate<F>(&mut self, key: &str, description: &str, predicate: F) -> &mut Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.define(key);
        self.allowed_values
            .entry(key.to_string())
            .or_default()
            .push(AllowedValue::Matching {
                description: description.to_string(),
                predicate: Arc::new(predicate),
            });
        self
    }

    /// Append a normalizer. Normalizers for one key run in registration
    /// order and see the pre-normalization options.
    pub fn add_normalizer<F>(&mut self, key: &str, normalizer: F) -> &mut Self
    where
        F: Fn(&Options, Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.define(key);
        self.normalizers
            .entry(key.to_string())
            .or_default()
            .push(Arc::new(normalizer));
        self
    }

    /// Accept keys nobody defined instead of rejecting them.
    pub fn allow_undefined(&mut self, allow: bool) -> &mut Self {
        self.allow_undefined = allow;
        self
    }

    pub fn is_defined(&self, key: &str) -> bool {
        self.defined.contains(key)
    }

    pub fn is_required(&self, key: &str) -> bool {
        self.required.contains(key)
    }

    pub fn defined_keys(&self) -> impl Iterator<Item = &str> {
        self.defined.iter().map(String::as_str)
    }

    /// The static default for `key`, if any.
    pub fn default_of(&self, key: &str) -> Option<&Value> {
        match self.defaults.get(key) {
            Some(DefaultValue::Static(value)) => Some(value),
            _ => None,
        }
    }

    /// Resolve raw options into a defaulted, validated, normalized map.
    pub fn resolve(&self, raw: &Options) -> Result<Options, SchemaViolation> {
        if !self.allow_undefined {
            if let Some(key) = raw.keys().find(|key| !self.defined.contains(*key)) {
                return Err(SchemaViolation::Undefined {
                    key: key.clone(),
                    defined: self.defined.iter().cloned().collect::<Vec<_>>().join(", "),
                });
            }
        }

        let mut resolved = raw.clone();
        for (key, default) in &self.defaults {
            if let DefaultValue::Static(value) = default {
                if !resolved.contains_key(key) {
                    resolved.insert(key.clone(), value.clone());
                }
            }
        }
        let snapshot = resolved.clone();
        for (key, default) in &self.defaults {
            if let DefaultValue::Lazy(compute) = default {
                if !snapshot.contains_key(key) {
                    if let Some(value) = compute(&snapshot) {
                        resolved.insert(key.clone(), value);
                    }
                }
            }
        }

        if let Some(key) = self.required.iter().find(|key| !resolved.contains_key(*key)) {
            return Err(SchemaViolation::MissingRequired(key.clone()));
        }

        for (key, types) in &self.allowed_types {
            if let Some(value) = resolved.get(key) {
                if !types.iter().any(|ty| ty.matches(value)) {
                    return Err(SchemaViolation::InvalidType {
                        key: key.clone(),
                        expected: types
                            .iter()
                            .map(ValueType::as_str)
                            .collect::<Vec<_>>()
                            .join("|"),
                        actual: ValueType::describe(value).to_string(),
                    });
                }
            }
        }

        for (key, allowed) in &self.allowed_values {
            if let Some(value) = resolved.get(key) {
                if !allowed.iter().any(|candidate| candidate.accepts(value)) {
                    return Err(SchemaViolation::InvalidValue {
                        key: key.clone(),
                        value: value.to_string(),
                        expected: allowed
                            .iter()
                            .map(AllowedValue::describe)
                            .collect::<Vec<_>>()
                            .join(" or "),
                    });
                }
            }
        }

        let snapshot = resolved.clone();
        for (key, normalizers) in &self.normalizers {
            let Some(mut value) = resolved.remove(key) else {
                continue;
            };
            for normalize in normalizers {
                value = normalize(&snapshot, value).map_err(|reason| {
                    SchemaViolation::Normalization {
                        key: key.clone(),
                        reason,
                    }
                })?;
            }
            resolved.insert(key.clone(), value);
        }

        Ok(resolved)
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
