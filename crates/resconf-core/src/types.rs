use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Loosely-typed option bag, the unit every raw and resolved entry is made of.
pub type Options = serde_json::Map<String, Value>;

/// Action name → option bag, as attached to a resource or emitted by builders.
pub type ActionMap = BTreeMap<String, Options>;

/// The five configurable entity kinds.
///
/// Declaration order is the Phase 1 resolution order: later kinds validate
/// against earlier ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Permission,
    Action,
    Behavior,
    Namespace,
    Resource,
}

impl EntityKind {
    /// All kinds in Phase 1 resolution order.
    pub const ALL: [EntityKind; 5] = [
        Self::Permission,
        Self::Action,
        Self::Behavior,
        Self::Namespace,
        Self::Resource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permission => "permission",
            Self::Action => "action",
            Self::Behavior => "behavior",
            Self::Namespace => "namespace",
            Self::Resource => "resource",
        }
    }

    /// Type-name suffixes stripped when deriving a short name from a type
    /// identifier (`acme::ExportAction` → `export`).
    pub fn type_suffixes(&self) -> &'static [&'static str] {
        match self {
            Self::Action => &["ActionBuilder", "Action"],
            Self::Behavior => &["BehaviorBuilder", "Behavior"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operations a behavior may participate in. Closed set; anything else in a
/// behavior's `operations` list is rejected during resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::List,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == value)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read a string option, treating `null` and absence alike.
pub fn option_str<'a>(options: &'a Options, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

/// Read a list of strings, skipping non-string entries.
pub fn option_str_list(options: &Options, key: &str) -> Vec<String> {
    options
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Read a nested object option; absent or non-object values yield an empty map.
pub fn option_object(options: &Options, key: &str) -> Options {
    options
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
