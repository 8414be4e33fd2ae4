//! Compile output and its on-disk form.
//!
//! A [`CompiledConfiguration`] is everything registries need: the five
//! resolved sets with their aliases and the kind-level defaults. It
//! serializes to plain JSON so a build step can dump it once and later
//! processes can start without re-running either phase.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use resconf_core::{EntityKind, Options};

use crate::resolved::ResolvedSet;
use crate::source::FrozenConfigSource;

/// Bumped whenever the persisted layout or resolution semantics change.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledConfiguration {
    pub format_version: u32,
    pub fingerprint: String,
    pub compiled_at: DateTime<Utc>,
    pub permissions: ResolvedSet,
    pub namespaces: ResolvedSet,
    pub actions: ResolvedSet,
    pub behaviors: ResolvedSet,
    pub resources: ResolvedSet,
    /// Kind-level defaults keyed by kind name.
    #[serde(default)]
    pub defaults: BTreeMap<String, Options>,
    /// The locked raw store; absent when loaded from disk.
    #[serde(skip)]
    pub(crate) source: Option<FrozenConfigSource>,
}

impl CompiledConfiguration {
    pub fn resolved(&self, kind: EntityKind) -> &ResolvedSet {
        match kind {
            EntityKind::Permission => &self.permissions,
            EntityKind::Namespace => &self.namespaces,
            EntityKind::Action => &self.actions,
            EntityKind::Behavior => &self.behaviors,
            EntityKind::Resource => &self.resources,
        }
    }

    pub fn kind_defaults(&self, kind: EntityKind) -> Options {
        self.defaults.get(kind.as_str()).cloned().unwrap_or_default()
    }

    pub fn source(&self) -> Option<&FrozenConfigSource> {
        self.source.as_ref()
    }

    /// Whether this output was produced by the current format from inputs
    /// with the given fingerprint.
    pub fn is_current(&self, fingerprint: &str) -> bool {
        self.format_version == FORMAT_VERSION && self.fingerprint == fingerprint
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize compiled configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write compiled configuration: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Saved compiled configuration");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read compiled configuration: {}", path.display()))?;
        let compiled: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse compiled configuration: {}", path.display()))?;
        Ok(compiled)
    }
}
