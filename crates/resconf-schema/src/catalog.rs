//! Build-time type tables.
//!
//! Implementing types for actions and behaviors are registered here together
//! with their self-described defaults, and entity types declare the
//! capability interfaces they implement. Everything the compiler would
//! otherwise discover by introspection is a lookup in this table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use resconf_core::{ActionMap, ConfigResult, EntityKind, Options, OptionsSchema};

use crate::resolver::SchemaResolver;

/// A type that can be named in a `class` option.
pub trait ConfigurableType: Send + Sync {
    /// Path identifier, e.g. `acme::action::ExportAction`.
    fn type_name(&self) -> &str;

    /// Self-described default options, applied when an entry is declared
    /// under the type identifier without an explicit `class`.
    fn default_options(&self) -> Options {
        Options::new()
    }

    /// Contribute the type's own option schema fragment, used when a
    /// resource attaches this action or behavior.
    fn configure_options(&self, _schema: &mut OptionsSchema) {}
}

/// An action that expands into concrete actions instead of running itself.
pub trait ActionBuilder: ConfigurableType {
    fn build_actions(
        &self,
        resolver: &SchemaResolver,
        resource: &Options,
        options: &Options,
    ) -> ConfigResult<ActionMap>;
}

/// Behavior implementation. A behavior builder overrides `build_actions` to
/// contribute actions to every resource it is attached to.
pub trait BehaviorType: ConfigurableType {
    fn build_actions(
        &self,
        _actions: &ActionMap,
        _resource: &Options,
        _options: &Options,
    ) -> ConfigResult<ActionMap> {
        Ok(ActionMap::new())
    }
}

/// Leaf action or action builder.
#[derive(Clone)]
pub enum ActionDefinition {
    Action(Arc<dyn ConfigurableType>),
    Builder(Arc<dyn ActionBuilder>),
}

impl ActionDefinition {
    pub fn configurable(&self) -> &dyn ConfigurableType {
        match self {
            Self::Action(action) => action.as_ref(),
            Self::Builder(builder) => builder.as_ref(),
        }
    }

    pub fn as_builder(&self) -> Option<&Arc<dyn ActionBuilder>> {
        match self {
            Self::Builder(builder) => Some(builder),
            Self::Action(_) => None,
        }
    }

    pub fn is_builder(&self) -> bool {
        matches!(self, Self::Builder(_))
    }
}

#[derive(Clone, Default)]
pub struct TypeCatalog {
    actions: BTreeMap<String, ActionDefinition>,
    behaviors: BTreeMap<String, Arc<dyn BehaviorType>>,
    capabilities: BTreeMap<String, BTreeSet<String>>,
}

impl std::fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action<T: ConfigurableType + 'static>(&mut self, action: T) -> &mut Self {
        self.actions.insert(
            action.type_name().to_string(),
            ActionDefinition::Action(Arc::new(action)),
        );
        self
    }

    pub fn register_action_builder<T: ActionBuilder + 'static>(&mut self, builder: T) -> &mut Self {
        self.actions.insert(
            builder.type_name().to_string(),
            ActionDefinition::Builder(Arc::new(builder)),
        );
        self
    }

    pub fn register_behavior<T: BehaviorType + 'static>(&mut self, behavior: T) -> &mut Self {
        self.behaviors
            .insert(behavior.type_name().to_string(), Arc::new(behavior));
        self
    }

    /// Declare that `type_name` implements each of `interfaces`. Interfaces
    /// may themselves be registered, making implementation transitive.
    pub fn register_capabilities<I, S>(&mut self, type_name: &str, interfaces: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .entry(type_name.to_string())
            .or_default()
            .extend(interfaces.into_iter().map(Into::into));
        self
    }

    pub fn action(&self, type_name: &str) -> Option<&ActionDefinition> {
        self.actions.get(type_name)
    }

    pub fn behavior(&self, type_name: &str) -> Option<&Arc<dyn BehaviorType>> {
        self.behaviors.get(type_name)
    }

    /// Whether `type_name` is a loadable implementing type for `kind`.
    pub fn has_type(&self, kind: EntityKind, type_name: &str) -> bool {
        match kind {
            EntityKind::Action => self.actions.contains_key(type_name),
            EntityKind::Behavior => self.behaviors.contains_key(type_name),
            _ => false,
        }
    }

    /// Self-described defaults for a registered action or behavior type.
    pub fn default_options(&self, kind: EntityKind, type_name: &str) -> Option<Options> {
        match kind {
            EntityKind::Action => self
                .action(type_name)
                .map(|definition| definition.configurable().default_options()),
            EntityKind::Behavior => self
                .behavior(type_name)
                .map(|behavior| behavior.default_options()),
            _ => None,
        }
    }

    /// All interfaces `type_name` implements, following interface-to-interface
    /// registrations.
    pub fn capabilities_of(&self, type_name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<&str> = vec![type_name];
        while let Some(current) = pending.pop() {
            let Some(direct) = self.capabilities.get(current) else {
                continue;
            };
            for interface in direct {
                if seen.insert(interface.clone()) {
                    pending.push(interface);
                }
            }
        }
        seen
    }

    pub fn implements(&self, type_name: &str, interface: &str) -> bool {
        self.capabilities_of(type_name).contains(interface)
    }

    /// Stable description of every registration, for input fingerprinting.
    pub fn signature(&self) -> Vec<String> {
        let mut entries = Vec::new();
        for (name, definition) in &self.actions {
            let tag = if definition.is_builder() {
                "action_builder"
            } else {
                "action"
            };
            entries.push(format!("{tag}:{name}"));
        }
        for name in self.behaviors.keys() {
            entries.push(format!("behavior:{name}"));
        }
        for (name, interfaces) in &self.capabilities {
            let joined = interfaces.iter().cloned().collect::<Vec<_>>().join(",");
            entries.push(format!("capability:{name}=>{joined}"));
        }
        entries
    }
}
