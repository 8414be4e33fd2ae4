//! Input fingerprint for persisted compile output.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;

use resconf_schema::SchemaResolver;

use crate::compiled::FORMAT_VERSION;
use crate::source::RawEntries;

/// SHA-256 hex digest over everything that determines the compiled output:
/// raw entries, extension order and catalog registrations.
pub fn fingerprint(entries: &RawEntries, resolver: &SchemaResolver) -> String {
    let payload = format!(
        "format={FORMAT_VERSION}\nentries={}\nextensions={}\ncatalog={}",
        entries.to_value(),
        resolver.extension_names().join(","),
        resolver.catalog().signature().join("\n"),
    );

    let digest = Sha256::digest(payload.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
