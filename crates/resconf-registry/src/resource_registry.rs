//! Resource lookups plus the hierarchy views derived from `parent` links.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use resconf_compiler::ResolvedSet;
use resconf_core::{ConfigError, ConfigResult, Options};

use crate::cache::{ConfigCache, MemoryCache};
use crate::config::{Children, ChildrenAccessor, ResourceConfig};
use crate::registry::Registry;

pub type ParentMap = BTreeMap<String, String>;
pub type DepthMap = BTreeMap<String, usize>;
pub type EventPriorityMap = BTreeMap<String, i64>;

/// Registry for resources. Configs it hands out can list their children;
/// the derived maps are computed once and kept until [`Self::invalidate`].
pub struct ResourceRegistry {
    registry: Registry<ResourceConfig>,
    parent_map: Mutex<Option<Arc<ParentMap>>>,
    depth_map: Mutex<Option<Arc<DepthMap>>>,
    event_priority_map: Mutex<Option<Arc<EventPriorityMap>>>,
}

impl ResourceRegistry {
    pub fn new(resolved: ResolvedSet, defaults: Options) -> Arc<Self> {
        Self::with_cache(resolved, defaults, MemoryCache::new())
    }

    pub fn with_cache(
        resolved: ResolvedSet,
        defaults: Options,
        cache: impl ConfigCache<ResourceConfig> + 'static,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let this = this.clone();
            let registry = Registry::new(resolved, defaults)
                .with_cache(cache)
                .with_post_construct(move |config: &mut ResourceConfig| {
                    let this = this.clone();
                    config.bind_children(ChildrenAccessor::new(move |parent| {
                        this.upgrade()
                            .ok_or(ConfigError::RegistryDropped)?
                            .children_of(parent)
                    }));
                });
            Self {
                registry,
                parent_map: Mutex::new(None),
                depth_map: Mutex::new(None),
                event_priority_map: Mutex::new(None),
            }
        })
    }

    pub fn registry(&self) -> &Registry<ResourceConfig> {
        &self.registry
    }

    pub fn alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.registry.alias(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.registry.has(name)
    }

    pub fn find(&self, name: &str) -> ConfigResult<Arc<ResourceConfig>> {
        self.registry.find(name)
    }

    pub fn find_optional(&self, name: &str) -> ConfigResult<Option<Arc<ResourceConfig>>> {
        self.registry.find_optional(name)
    }

    pub fn all(&self) -> impl Iterator<Item = ConfigResult<Arc<ResourceConfig>>> + '_ {
        self.registry.all()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn warm_up(&self) -> ConfigResult<usize> {
        self.registry.warm_up()
    }

    /// Child name to parent name. Fails on self-parenting or any cycle.
    pub fn parent_map(&self) -> ConfigResult<Arc<ParentMap>> {
        cached(&self.parent_map, || self.compute_parent_map())
    }

    /// Number of ancestors for every resource; roots are 0.
    pub fn depth_map(&self) -> ConfigResult<Arc<DepthMap>> {
        cached(&self.depth_map, || self.compute_depth_map())
    }

    /// Event priorities, omitting resources at priority 0.
    pub fn event_priority_map(&self) -> ConfigResult<Arc<EventPriorityMap>> {
        cached(&self.event_priority_map, || {
            let mut priorities = EventPriorityMap::new();
            for config in self.all() {
                let config = config?;
                if config.event_priority != 0 {
                    priorities.insert(config.name.clone(), config.event_priority);
                }
            }
            Ok(priorities)
        })
    }

    /// Drop the derived maps so the next call recomputes them.
    pub fn invalidate(&self) {
        *lock(&self.parent_map) = None;
        *lock(&self.depth_map) = None;
        *lock(&self.event_priority_map) = None;
        tracing::debug!("Invalidated resource hierarchy maps");
    }

    fn children_of(&self, parent: &ResourceConfig) -> ConfigResult<Children> {
        let mut children = Children::new();
        for config in self.all() {
            let config = config?;
            if config.parent.as_deref() != Some(parent.name.as_str()) {
                continue;
            }
            if config.namespace != parent.namespace {
                return Err(ConfigError::NamespaceMismatch {
                    parent: parent.name.clone(),
                    child: config.name.clone(),
                    parent_namespace: parent.namespace.clone(),
                    child_namespace: config.namespace.clone(),
                });
            }
            children.insert(config.name.clone(), config);
        }
        Ok(children)
    }

    fn compute_parent_map(&self) -> ConfigResult<ParentMap> {
        let mut parents = ParentMap::new();
        for config in self.all() {
            let config = config?;
            if let Some(parent) = &config.parent {
                parents.insert(config.name.clone(), parent.clone());
            }
        }

        for start in parents.keys() {
            let mut chain = vec![start.clone()];
            let mut current = start;
            while let Some(parent) = parents.get(current) {
                let seen = chain.contains(parent);
                chain.push(parent.clone());
                if seen {
                    return Err(ConfigError::ParentCycle {
                        resource: start.clone(),
                        chain,
                    });
                }
                current = parent;
            }
        }
        Ok(parents)
    }

    fn compute_depth_map(&self) -> ConfigResult<DepthMap> {
        let parents = self.parent_map()?;
        let mut depths = DepthMap::new();
        for name in self.names() {
            let mut depth = 0;
            let mut current = name;
            while let Some(parent) = parents.get(current) {
                depth += 1;
                if depth > parents.len() {
                    return Err(ConfigError::ParentCycle {
                        resource: name.to_string(),
                        chain: vec![name.to_string(), parent.clone()],
                    });
                }
                current = parent;
            }
            depths.insert(name.to_string(), depth);
        }
        Ok(depths)
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn lock<V>(slot: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cached<V>(
    slot: &Mutex<Option<Arc<V>>>,
    compute: impl FnOnce() -> ConfigResult<V>,
) -> ConfigResult<Arc<V>> {
    let mut guard = lock(slot);
    if let Some(value) = guard.as_ref() {
        return Ok(Arc::clone(value));
    }
    let value = Arc::new(compute()?);
    *guard = Some(Arc::clone(&value));
    Ok(value)
}

#[cfg(test)]
#[path = "resource_registry_tests.rs"]
mod tests;
