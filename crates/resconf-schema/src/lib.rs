//! Option schemas per entity kind, assembled from the core extension and
//! any registered [`SchemaExtension`]s, plus the catalog of implementing
//! types that `class` options name.

pub mod catalog;
pub mod core_extension;
pub mod extension;
pub mod resolver;

pub use catalog::{ActionBuilder, ActionDefinition, BehaviorType, ConfigurableType, TypeCatalog};
pub use core_extension::{CoreExtension, DEFAULT_DRIVER};
pub use extension::{KindDefaults, SchemaExtension};
pub use resolver::SchemaResolver;
