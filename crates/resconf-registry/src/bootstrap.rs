//! Startup path from raw entries to ready registries, optionally reusing a
//! compile output persisted by an earlier run.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use resconf_compiler::{
    CompiledConfiguration, CompilerSettings, MutableConfigSource, compile, fingerprint,
};
use resconf_schema::SchemaResolver;

use crate::registries::Registries;

/// Compile `source` (or reuse the persisted output when its fingerprint
/// still matches) and build the registries.
pub fn bootstrap(
    settings: &CompilerSettings,
    project_root: &Path,
    source: MutableConfigSource,
    resolver: Arc<SchemaResolver>,
) -> Result<Registries> {
    let compiled = if settings.cache.enabled {
        let path = settings.cache_path(project_root);
        compile_cached(&path, source, resolver)?
    } else {
        compile(source, resolver).context("Failed to compile configuration")?
    };

    let registries = Registries::from_compiled(&compiled);
    if settings.registry.warm_up {
        registries
            .warm_up()
            .context("Failed to construct configuration values")?;
    }
    Ok(registries)
}

fn compile_cached(
    path: &Path,
    source: MutableConfigSource,
    resolver: Arc<SchemaResolver>,
) -> Result<CompiledConfiguration> {
    let expected = fingerprint(source.entries(), &resolver);
    if let Some(compiled) = load_current(path, &expected) {
        return Ok(compiled);
    }

    let compiled = compile(source, resolver).context("Failed to compile configuration")?;
    if let Err(e) = compiled.save(path) {
        tracing::warn!(path = %path.display(), "Failed to persist compiled configuration: {e:#}");
    }
    Ok(compiled)
}

fn load_current(path: &Path, expected: &str) -> Option<CompiledConfiguration> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No persisted compiled configuration");
        return None;
    }
    match CompiledConfiguration::load(path) {
        Ok(compiled) if compiled.is_current(expected) => {
            tracing::info!(
                path = %path.display(),
                compiled_at = %compiled.compiled_at,
                "Reusing persisted compiled configuration"
            );
            Some(compiled)
        }
        Ok(_) => {
            tracing::info!(path = %path.display(), "Persisted compiled configuration is stale; recompiling");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Ignoring unreadable compiled configuration: {e:#}");
            None
        }
    }
}
