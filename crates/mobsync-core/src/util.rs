//! Shared utility functions used across multiple modules.

use std::hash::{Hash, Hasher};

/// Check that a table or column name is a plain SQL identifier.
///
/// Registry identifiers are interpolated into SQL text, so anything other than
/// `[A-Za-z_][A-Za-z0-9_]*` is rejected when the registry is built.
pub fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Non-reversible user fingerprint for log lines.
pub fn user_fingerprint(user_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    hasher.finish()
}
