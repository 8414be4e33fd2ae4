//! Types and sources shared by the compiler's unit tests.

use serde_json::{Value, json};
use std::sync::Arc;

use resconf_core::{ActionMap, ConfigResult, Options, OptionsSchema, ValueType};
use resconf_schema::{ActionBuilder, BehaviorType, ConfigurableType, SchemaResolver, TypeCatalog};

use crate::source::MutableConfigSource;

pub(crate) fn obj(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub(crate) struct ViewAction;

impl ConfigurableType for ViewAction {
    fn type_name(&self) -> &str {
        "acme::action::ViewAction"
    }

    fn configure_options(&self, schema: &mut OptionsSchema) {
        schema
            .set_default("template", json!("view.html"))
            .set_allowed_types("template", &[ValueType::String])
            .set_allowed_types("layout", &[ValueType::String]);
    }
}

pub(crate) struct EditAction;

impl ConfigurableType for EditAction {
    fn type_name(&self) -> &str {
        "acme::action::EditAction"
    }
}

pub(crate) struct ExportAction;

impl ConfigurableType for ExportAction {
    fn type_name(&self) -> &str {
        "acme::action::ExportAction"
    }

    fn default_options(&self) -> Options {
        obj(json!({"route": "/export", "permissions": ["export"]}))
    }
}

/// Emits `view` (with the builder's template) and optionally `edit`.
pub(crate) struct CrudActionBuilder;

impl ConfigurableType for CrudActionBuilder {
    fn type_name(&self) -> &str {
        "acme::action::CrudActionBuilder"
    }

    fn configure_options(&self, schema: &mut OptionsSchema) {
        schema
            .set_default("template", json!("a"))
            .set_default("with_edit", json!(true))
            .set_allowed_types("with_edit", &[ValueType::Bool]);
    }
}

impl ActionBuilder for CrudActionBuilder {
    fn build_actions(
        &self,
        _resolver: &SchemaResolver,
        _resource: &Options,
        options: &Options,
    ) -> ConfigResult<ActionMap> {
        let mut actions = ActionMap::new();
        let template = options.get("template").cloned().unwrap_or(Value::Null);
        actions.insert("view".into(), obj(json!({"template": template})));
        if options.get("with_edit") == Some(&json!(true)) {
            actions.insert("edit".into(), Options::new());
        }
        Ok(actions)
    }
}

/// Emits another builder, which is not supported.
pub(crate) struct NestedActionBuilder;

impl ConfigurableType for NestedActionBuilder {
    fn type_name(&self) -> &str {
        "acme::action::NestedActionBuilder"
    }
}

impl ActionBuilder for NestedActionBuilder {
    fn build_actions(
        &self,
        _resolver: &SchemaResolver,
        _resource: &Options,
        _options: &Options,
    ) -> ConfigResult<ActionMap> {
        Ok(ActionMap::from([("crud".to_string(), Options::new())]))
    }
}

pub(crate) struct AuditBehavior;

impl ConfigurableType for AuditBehavior {
    fn type_name(&self) -> &str {
        "acme::behavior::AuditBehavior"
    }

    fn default_options(&self) -> Options {
        obj(json!({"interface": "acme::Auditable", "operations": ["create", "update"]}))
    }

    fn configure_options(&self, schema: &mut OptionsSchema) {
        schema.set_default("channel", json!("log"));
    }
}

impl BehaviorType for AuditBehavior {}

/// Cannot be attached without an explicit `table` option.
pub(crate) struct StrictBehavior;

impl ConfigurableType for StrictBehavior {
    fn type_name(&self) -> &str {
        "acme::behavior::StrictBehavior"
    }

    fn default_options(&self) -> Options {
        obj(json!({"interface": "acme::Strict", "operations": ["update"]}))
    }

    fn configure_options(&self, schema: &mut OptionsSchema) {
        schema
            .set_required("table")
            .set_allowed_types("table", &[ValueType::String]);
    }
}

impl BehaviorType for StrictBehavior {}

/// Contributes a timeline layout to `view` and attaches `edit`.
pub(crate) struct HistoryBehavior;

impl ConfigurableType for HistoryBehavior {
    fn type_name(&self) -> &str {
        "acme::behavior::HistoryBehavior"
    }

    fn default_options(&self) -> Options {
        obj(json!({"interface": null, "operations": ["read"]}))
    }
}

impl BehaviorType for HistoryBehavior {
    fn build_actions(
        &self,
        _actions: &ActionMap,
        _resource: &Options,
        _options: &Options,
    ) -> ConfigResult<ActionMap> {
        Ok(ActionMap::from([
            (
                "view".to_string(),
                obj(json!({"layout": "timeline", "template": "history.html"})),
            ),
            ("edit".to_string(), Options::new()),
        ]))
    }
}

pub(crate) fn catalog() -> Arc<TypeCatalog> {
    let mut catalog = TypeCatalog::new();
    catalog
        .register_action(ViewAction)
        .register_action(EditAction)
        .register_action(ExportAction)
        .register_action_builder(CrudActionBuilder)
        .register_action_builder(NestedActionBuilder)
        .register_behavior(AuditBehavior)
        .register_behavior(StrictBehavior)
        .register_behavior(HistoryBehavior)
        .register_capabilities("acme::Post", ["acme::Auditable"])
        .register_capabilities("acme::Ledger", ["acme::Strict"]);
    Arc::new(catalog)
}

pub(crate) fn resolver(catalog: &Arc<TypeCatalog>) -> Arc<SchemaResolver> {
    Arc::new(SchemaResolver::new(Arc::clone(catalog)))
}

/// Permissions `read` and `export`, namespace `acme`, actions `view`,
/// `edit`, `export`, `crud`, behavior `audit`. No resources.
pub(crate) fn base_source(catalog: &Arc<TypeCatalog>) -> MutableConfigSource {
    let mut source = MutableConfigSource::new(Arc::clone(catalog));
    source
        .add_permission("read", obj(json!({"label": "Read"})))
        .unwrap();
    source.add_permission("export", Options::new()).unwrap();
    source.add_namespace("acme", Options::new()).unwrap();
    source
        .add_action(
            "view",
            obj(json!({
                "class": "acme::action::ViewAction",
                "route": "/posts/{id}",
                "permissions": ["read"],
            })),
        )
        .unwrap();
    source
        .add_action("edit", obj(json!({"class": "acme::action::EditAction"})))
        .unwrap();
    source
        .add_action("acme::action::ExportAction", Options::new())
        .unwrap();
    source
        .add_action("crud", obj(json!({"class": "acme::action::CrudActionBuilder"})))
        .unwrap();
    source
        .add_behavior("audit", obj(json!({"class": "acme::behavior::AuditBehavior"})))
        .unwrap();
    source
}
