//! Name and type-identifier syntax.
//!
//! Entity names are lowercase, underscore-separated tokens, optionally
//! dotted (`acme.blog_post`). Implementing types are referenced by a path
//! identifier (`acme::action::ExportAction`).

use regex::Regex;
use std::sync::LazyLock;

use crate::types::EntityKind;

/// Matches a path-like type identifier with at least two segments.
static TYPE_IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)+$").expect("valid regex")
});

/// Matches a normalized entity name.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*(?:\.[a-z][a-z0-9_]*)*$").expect("valid regex")
});

/// Whether `value` syntactically denotes an implementing type.
pub fn is_type_identifier(value: &str) -> bool {
    TYPE_IDENTIFIER_RE.is_match(value)
}

/// Whether `value` is already a valid normalized name.
pub fn is_valid_name(value: &str) -> bool {
    NAME_RE.is_match(value)
}

/// Normalize a declared name: camel case is split on word boundaries,
/// `-` and whitespace become `_`, everything is lowercased. Dots are kept.
pub fn normalize_name(raw: &str) -> String {
    let chars: Vec<char> = raw.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') && !out.ends_with('.') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == '-' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        } else if c == '_' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    out.trim_matches('_').to_string()
}

/// Last path segment of a type identifier.
pub fn type_short_name(type_identifier: &str) -> &str {
    type_identifier
        .rsplit("::")
        .next()
        .unwrap_or(type_identifier)
}

/// Derive the canonical short name for an implementing type, stripping the
/// kind's conventional suffix (`acme::action::ExportAction` → `export`).
pub fn name_from_type(kind: EntityKind, type_identifier: &str) -> String {
    let short = type_short_name(type_identifier);
    let stripped = kind
        .type_suffixes()
        .iter()
        .find_map(|suffix| short.strip_suffix(suffix).filter(|rest| !rest.is_empty()))
        .unwrap_or(short);
    normalize_name(stripped)
}

/// Canonical name for a raw entry key: type identifiers go through
/// [`name_from_type`], anything else through [`normalize_name`].
pub fn derive_name(kind: EntityKind, key: &str) -> String {
    if is_type_identifier(key) {
        name_from_type(kind, key)
    } else {
        normalize_name(key)
    }
}

/// Human label from a normalized name: `export_csv` → `Export csv`.
pub fn humanize(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '_' || c == '.' { ' ' } else { c })
        .collect();
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
