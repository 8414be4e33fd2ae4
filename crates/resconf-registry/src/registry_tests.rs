use super::*;
use crate::config::{ActionConfig, PermissionConfig};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};

fn obj(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn permissions() -> ResolvedSet {
    let mut set = ResolvedSet::default();
    set.configs.insert(
        "read".into(),
        obj(json!({"name": "read", "label": "Read", "translation_domain": null})),
    );
    set.configs.insert(
        "export".into(),
        obj(json!({"name": "export", "label": "Export", "translation_domain": null})),
    );
    set.aliases.insert("Read".into(), "read".into());
    set
}

#[test]
fn test_alias_is_identity_for_unknown_names() {
    let registry: Registry<PermissionConfig> = Registry::new(permissions(), Options::new());

    assert_eq!(registry.alias("Read"), "read");
    assert_eq!(registry.alias("read"), "read");
    assert_eq!(registry.alias("missing"), "missing");
}

#[test]
fn test_has_follows_aliases() {
    let registry: Registry<PermissionConfig> = Registry::new(permissions(), Options::new());

    assert!(registry.has("read"));
    assert!(registry.has("Read"));
    assert!(!registry.has("write"));
}

#[test]
fn test_find_returns_same_instance_through_alias() {
    let registry: Registry<PermissionConfig> = Registry::new(permissions(), Options::new());

    let direct = registry.find("read").unwrap();
    let aliased = registry.find("Read").unwrap();
    assert!(Arc::ptr_eq(&direct, &aliased));
    assert_eq!(direct.label, "Read");
}

#[test]
fn test_find_missing_is_not_found() {
    let registry: Registry<PermissionConfig> = Registry::new(permissions(), Options::new());

    let err = registry.find("write").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        "No permission configuration found for 'write'"
    );
    assert!(registry.find_optional("write").unwrap().is_none());
}

#[test]
fn test_kind_defaults_fill_under_stored_options() {
    let mut actions = ResolvedSet::default();
    actions.configs.insert(
        "view".into(),
        obj(json!({
            "name": "view",
            "class": "acme::action::ViewAction",
            "options": {"template": "view.html"},
        })),
    );
    let defaults = obj(json!({
        "options": {"template": "default.html", "layout": "main"},
        "button": {"icon": "eye"},
    }));

    let registry: Registry<ActionConfig> = Registry::new(actions, defaults);
    let view = registry.find("view").unwrap();

    assert_eq!(view.options["template"], json!("view.html"));
    assert_eq!(view.options["layout"], json!("main"));
    assert_eq!(view.button, Some(json!({"icon": "eye"})));
}

#[test]
fn test_post_construct_runs_once_per_entry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let registry: Registry<PermissionConfig> = Registry::new(permissions(), Options::new())
        .with_post_construct(move |config: &mut PermissionConfig| {
            counter.fetch_add(1, Ordering::SeqCst);
            config.label = config.label.to_uppercase();
        });

    assert_eq!(registry.find("read").unwrap().label, "READ");
    registry.find("Read").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_preloaded_cache_is_served_without_construction() {
    let preloaded = PermissionConfig {
        name: "read".into(),
        label: "From disk".into(),
        translation_domain: None,
        extra: Options::new(),
    };
    let registry: Registry<PermissionConfig> = Registry::new(permissions(), Options::new())
        .with_cache(MemoryCache::preloaded([(
            "read".to_string(),
            Arc::new(preloaded),
        )]));

    assert_eq!(registry.find("Read").unwrap().label, "From disk");
}

#[test]
fn test_all_is_restartable_and_ordered() {
    let registry: Registry<PermissionConfig> = Registry::new(permissions(), Options::new());

    let first: Vec<String> = registry
        .all()
        .map(|config| config.unwrap().name.clone())
        .collect();
    let second: Vec<String> = registry
        .all()
        .map(|config| config.unwrap().name.clone())
        .collect();

    assert_eq!(first, vec!["export", "read"]);
    assert_eq!(first, second);
}

#[test]
fn test_construct_failure_surfaces_from_find() {
    let mut set = ResolvedSet::default();
    set.configs
        .insert("broken".into(), obj(json!({"name": "broken", "label": 7})));
    let registry: Registry<PermissionConfig> = Registry::new(set, Options::new());

    let err = registry.find("broken").unwrap_err();
    assert!(matches!(err, ConfigError::Construct { kind: EntityKind::Permission, .. }));
    assert!(registry.warm_up().is_err());
}

#[test]
fn test_warm_up_counts_entries() {
    let registry: Registry<PermissionConfig> = Registry::new(permissions(), Options::new());
    assert_eq!(registry.warm_up().unwrap(), 2);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.kind(), EntityKind::Permission);
}
