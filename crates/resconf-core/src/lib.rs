//! Shared vocabulary for the resource configuration compiler: entity kinds,
//! option bags, naming rules, deep merge, option schemas and errors.

pub mod error;
pub mod merge;
pub mod naming;
pub mod schema;
pub mod types;

pub use error::{ConfigError, ConfigResult, ErrorCategory, SchemaViolation};
pub use merge::{fill_missing, merge_options, merge_values};
pub use schema::{OptionsSchema, ValueType};
pub use types::{ActionMap, EntityKind, Operation, Options};
