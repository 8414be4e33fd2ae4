//! Storage for constructed configs, keyed by canonical name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Where a [`crate::Registry`] keeps the values it has already built.
///
/// Implementations must be safe to share between readers; the registry
/// never tells a preloaded value apart from one it constructed itself.
pub trait ConfigCache<T>: Send + Sync {
    fn has(&self, name: &str) -> bool;
    fn get(&self, name: &str) -> Option<Arc<T>>;
    fn set(&self, name: &str, config: Arc<T>);
}

pub struct MemoryCache<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> MemoryCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache seeded with already constructed values.
    pub fn preloaded(entries: impl IntoIterator<Item = (String, Arc<T>)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written map, so a
    // poisoned guard is still usable.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<T>>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> ConfigCache<T> for MemoryCache<T> {
    fn has(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Arc<T>> {
        self.read().get(name).cloned()
    }

    fn set(&self, name: &str, config: Arc<T>) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let cache = MemoryCache::new();
        assert!(!cache.has("view"));

        cache.set("view", Arc::new(1));
        assert!(cache.has("view"));
        assert_eq!(cache.get("view").as_deref(), Some(&1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_preloaded_entries_are_visible() {
        let cache = MemoryCache::preloaded([("a".to_string(), Arc::new("x"))]);
        assert_eq!(cache.get("a").as_deref(), Some(&"x"));
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_set_replaces_existing() {
        let cache = MemoryCache::new();
        cache.set("a", Arc::new(1));
        cache.set("a", Arc::new(2));
        assert_eq!(cache.get("a").as_deref(), Some(&2));
        assert_eq!(cache.len(), 1);
    }
}
