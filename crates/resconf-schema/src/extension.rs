use resconf_core::{EntityKind, Options, OptionsSchema, merge_options};

/// Accumulates kind-level defaults contributed by extensions. Registries
/// deep-merge these under every stored entry when constructing configs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KindDefaults(Options);

impl KindDefaults {
    /// Deep-merge `defaults` into the accumulator; later contributions win.
    pub fn merge(&mut self, defaults: Options) {
        let current = std::mem::take(&mut self.0);
        self.0 = merge_options(current, defaults);
    }

    pub fn as_options(&self) -> &Options {
        &self.0
    }

    pub fn into_options(self) -> Options {
        self.0
    }
}

/// Plugin point contributing schema rules and defaults per entity kind.
///
/// Extensions are applied in a stable order, after the always-present core
/// extension. Every method defaults to contributing nothing.
pub trait SchemaExtension: Send + Sync {
    fn name(&self) -> &str;

    fn extend_permission_config(&self, _schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {}

    fn extend_namespace_config(&self, _schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {}

    fn extend_action_config(&self, _schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {}

    fn extend_behavior_config(&self, _schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {}

    fn extend_resource_config(&self, _schema: &mut OptionsSchema, _defaults: &mut KindDefaults) {}

    /// Contribute to the option schema of one action as attached to a
    /// resource. `action` is the action's resolved kind-level config.
    fn extend_action_options(&self, _schema: &mut OptionsSchema, _action: &Options) {}

    /// Contribute to the option schema of one behavior as attached to a
    /// resource. `behavior` is the behavior's resolved kind-level config.
    fn extend_behavior_options(&self, _schema: &mut OptionsSchema, _behavior: &Options) {}
}

/// Route a kind-level contribution to the matching `extend_*_config` method.
pub(crate) fn extend_config(
    extension: &dyn SchemaExtension,
    kind: EntityKind,
    schema: &mut OptionsSchema,
    defaults: &mut KindDefaults,
) {
    match kind {
        EntityKind::Permission => extension.extend_permission_config(schema, defaults),
        EntityKind::Namespace => extension.extend_namespace_config(schema, defaults),
        EntityKind::Action => extension.extend_action_config(schema, defaults),
        EntityKind::Behavior => extension.extend_behavior_config(schema, defaults),
        EntityKind::Resource => extension.extend_resource_config(schema, defaults),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_kind_defaults_deep_merge_later_wins() {
        let mut defaults = KindDefaults::default();
        defaults.merge(
            json!({"search": {"index": "main", "boost": 1}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        defaults.merge(json!({"search": {"boost": 2}}).as_object().cloned().unwrap());

        assert_eq!(
            Value::Object(defaults.into_options()),
            json!({"search": {"index": "main", "boost": 2}})
        );
    }
}
