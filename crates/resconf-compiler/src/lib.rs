//! Two-phase compiler from raw configuration entries to resolved,
//! alias-indexed sets.
//!
//! ```text
//! MutableConfigSource ──build()──▶ BuiltConfiguration ──finalize()──▶ CompiledConfiguration
//! ```

pub mod builder;
pub mod compiled;
mod finalize;
pub mod fingerprint;
pub mod resolved;
pub mod settings;
pub mod source;

#[cfg(test)]
mod test_fixtures;

use std::sync::Arc;

use resconf_core::ConfigResult;
use resconf_schema::SchemaResolver;

pub use builder::{BuiltConfiguration, ConfigurationBuilder};
pub use compiled::{CompiledConfiguration, FORMAT_VERSION};
pub use fingerprint::fingerprint;
pub use resolved::ResolvedSet;
pub use settings::{CacheSettings, CompilerSettings, RegistrySettings};
pub use source::{FrozenConfigSource, MutableConfigSource, RawEntries};

/// Run both phases over `source`.
pub fn compile(
    source: MutableConfigSource,
    resolver: Arc<SchemaResolver>,
) -> ConfigResult<CompiledConfiguration> {
    ConfigurationBuilder::new(source, resolver).build()?.finalize()
}
