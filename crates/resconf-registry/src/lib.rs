//! Alias-aware, cached registries over compiled configuration.
//!
//! Registries are read-only once built. The only state that changes
//! afterwards is each registry's cache of constructed values, which
//! [`Registries::warm_up`] fills eagerly.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod registries;
pub mod registry;
pub mod resource_registry;

pub use bootstrap::bootstrap;
pub use cache::{ConfigCache, MemoryCache};
pub use config::{
    ActionConfig, BehaviorConfig, Children, ChildrenAccessor, EntityConfig, NamespaceConfig,
    PermissionConfig, ResourceConfig,
};
pub use registries::Registries;
pub use registry::Registry;
pub use resource_registry::{DepthMap, EventPriorityMap, ParentMap, ResourceRegistry};
