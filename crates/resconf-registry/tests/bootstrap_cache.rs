use serde_json::{Value, json};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

use resconf_compiler::{CompiledConfiguration, CompilerSettings, MutableConfigSource};
use resconf_core::Options;
use resconf_registry::bootstrap;
use resconf_schema::{SchemaResolver, TypeCatalog};

fn obj(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn inputs(label: &str) -> (MutableConfigSource, Arc<SchemaResolver>) {
    let catalog = Arc::new(TypeCatalog::new());
    let mut source = MutableConfigSource::new(Arc::clone(&catalog));
    source
        .add_permission("read", obj(json!({"label": label})))
        .unwrap();
    source.add_namespace("acme", Options::new()).unwrap();
    source
        .add_resource(
            "acme.post",
            obj(json!({"namespace": "acme", "entity": "acme::Post", "permissions": ["read"]})),
        )
        .unwrap();
    (source, Arc::new(SchemaResolver::new(catalog)))
}

#[derive(Clone)]
struct SharedBufferWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for SharedBufferWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut guard = self.buf.lock().expect("buffer lock poisoned");
        guard.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct SharedMakeWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedMakeWriter {
    type Writer = SharedBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedBufferWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}

fn cached_settings() -> CompilerSettings {
    let mut settings = CompilerSettings::default();
    settings.cache.enabled = true;
    settings
}

fn run(root: &Path, settings: &CompilerSettings, label: &str) -> String {
    let (source, resolver) = inputs(label);
    let registries = bootstrap(settings, root, source, resolver).unwrap();
    registries.permissions.find("read").unwrap().label.clone()
}

#[test]
fn first_run_persists_compiled_output() {
    let dir = tempfile::tempdir().unwrap();
    let settings = cached_settings();

    assert_eq!(run(dir.path(), &settings, "Read"), "Read");

    let path = settings.cache_path(dir.path());
    assert!(path.exists());
    let persisted = CompiledConfiguration::load(&path).unwrap();
    assert!(persisted.resources.contains("acme::Post"));
}

#[test]
fn matching_fingerprint_reuses_persisted_output() {
    let dir = tempfile::tempdir().unwrap();
    let settings = cached_settings();
    run(dir.path(), &settings, "Read");

    let path = settings.cache_path(dir.path());
    let mut persisted = CompiledConfiguration::load(&path).unwrap();
    let marker = persisted.compiled_at;
    persisted
        .permissions
        .configs
        .get_mut("read")
        .unwrap()
        .insert("label".into(), json!("From disk"));
    persisted.save(&path).unwrap();

    assert_eq!(run(dir.path(), &settings, "Read"), "From disk");
    assert_eq!(CompiledConfiguration::load(&path).unwrap().compiled_at, marker);
}

#[test]
fn changed_inputs_recompile_and_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let settings = cached_settings();
    run(dir.path(), &settings, "Read");

    assert_eq!(run(dir.path(), &settings, "Read access"), "Read access");

    let persisted = CompiledConfiguration::load(&settings.cache_path(dir.path())).unwrap();
    assert_eq!(
        persisted.permissions.get("read").unwrap()["label"],
        json!("Read access")
    );
}

#[test]
fn unreadable_cache_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let settings = cached_settings();
    let path = settings.cache_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "not json").unwrap();

    let log_buf = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_writer(SharedMakeWriter {
            buf: Arc::clone(&log_buf),
        })
        .finish();

    let label = tracing::subscriber::with_default(subscriber, || {
        run(dir.path(), &settings, "Read")
    });

    assert_eq!(label, "Read");
    assert!(CompiledConfiguration::load(&path).is_ok());
    let logs = String::from_utf8(log_buf.lock().expect("buffer lock poisoned").clone())
        .expect("logs should be valid UTF-8");
    assert!(
        logs.contains("Ignoring unreadable compiled configuration"),
        "Expected warning log, got: {logs}"
    );
}

#[test]
fn disabled_cache_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let settings = CompilerSettings::default();

    assert_eq!(run(dir.path(), &settings, "Read"), "Read");
    assert!(!settings.cache_path(dir.path()).exists());
}

#[test]
fn compile_errors_surface_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(TypeCatalog::new());
    let mut source = MutableConfigSource::new(Arc::clone(&catalog));
    source
        .add_resource("acme.post", obj(json!({"namespace": "acme", "entity": "acme::Post"})))
        .unwrap();

    let err = bootstrap(
        &CompilerSettings::default(),
        dir.path(),
        source,
        Arc::new(SchemaResolver::new(catalog)),
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "Failed to compile configuration");
    assert!(format!("{err:#}").contains("unknown namespace 'acme'"));
}
