use std::collections::BTreeMap;
use std::sync::Arc;

use resconf_compiler::ResolvedSet;
use resconf_core::{ConfigError, ConfigResult, EntityKind, Options, merge_options};

use crate::cache::{ConfigCache, MemoryCache};
use crate::config::EntityConfig;

type PostConstruct<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Alias-aware lookup over one kind's resolved entries.
///
/// Values are constructed on first lookup and kept in the cache, so every
/// later lookup through any alias returns the same `Arc`.
pub struct Registry<T: EntityConfig> {
    configs: BTreeMap<String, Options>,
    aliases: BTreeMap<String, String>,
    defaults: Options,
    cache: Box<dyn ConfigCache<T>>,
    post_construct: Option<PostConstruct<T>>,
}

impl<T: EntityConfig> Registry<T> {
    pub fn new(resolved: ResolvedSet, defaults: Options) -> Self {
        Self {
            configs: resolved.configs,
            aliases: resolved.aliases,
            defaults,
            cache: Box::new(MemoryCache::new()),
            post_construct: None,
        }
    }

    pub fn with_cache(mut self, cache: impl ConfigCache<T> + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    /// Hook run on every freshly constructed value before it is cached.
    pub fn with_post_construct(mut self, hook: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.post_construct = Some(Box::new(hook));
        self
    }

    pub fn kind(&self) -> EntityKind {
        T::KIND
    }

    /// Canonical name for `name`, or `name` itself when nothing aliases it.
    pub fn alias<'a>(&'a self, name: &'a str) -> &'a str {
        if self.configs.contains_key(name) {
            return name;
        }
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.configs.contains_key(self.alias(name))
    }

    pub fn find(&self, name: &str) -> ConfigResult<Arc<T>> {
        self.find_optional(name)?.ok_or_else(|| ConfigError::NotFound {
            kind: T::KIND,
            name: name.to_string(),
        })
    }

    /// Like [`Registry::find`], but a missing entry is `Ok(None)`. Errors
    /// only when a stored entry cannot be constructed.
    pub fn find_optional(&self, name: &str) -> ConfigResult<Option<Arc<T>>> {
        let Some((key, stored)) = self.configs.get_key_value(self.alias(name)) else {
            return Ok(None);
        };
        if let Some(config) = self.cache.get(key) {
            tracing::trace!(kind = %T::KIND, name = %key, "Config cache hit");
            return Ok(Some(config));
        }
        tracing::trace!(kind = %T::KIND, name = %key, "Config cache miss");

        let options = merge_options(self.defaults.clone(), stored.clone());
        let mut config = T::from_options(key, &options)?;
        if let Some(hook) = &self.post_construct {
            hook(&mut config);
        }
        let config = Arc::new(config);
        self.cache.set(key, Arc::clone(&config));
        Ok(Some(config))
    }

    /// Every entry in name order. Each call starts a fresh pass; values are
    /// cached as they are visited.
    pub fn all(&self) -> impl Iterator<Item = ConfigResult<Arc<T>>> + '_ {
        self.configs.keys().map(|name| self.find(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Construct every entry now so later concurrent readers only hit the
    /// cache. Returns how many entries were visited.
    pub fn warm_up(&self) -> ConfigResult<usize> {
        let mut count = 0;
        for config in self.all() {
            config?;
            count += 1;
        }
        tracing::debug!(kind = %T::KIND, count, "Warmed up registry");
        Ok(count)
    }
}

impl<T: EntityConfig> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &T::KIND)
            .field("entries", &self.configs.len())
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
