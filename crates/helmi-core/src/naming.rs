//! Release naming
//!
//! Helm v2 limits release names, and instance ids handed to the broker are
//! usually GUIDs. Every instance id maps to the same release name each time.

/// Prefix carried by every release created by the broker
pub const RELEASE_PREFIX: &str = "helmi";

/// Number of instance id characters kept after sanitizing
const NAME_CHARS: usize = 14;

/// Derive the Helm release name for a service instance id
///
/// Ids that already carry [`RELEASE_PREFIX`] are used as-is. Anything else is
/// lowercased, stripped of `-` and `_`, and cut to 14 characters.
pub fn release_name(instance_id: &str) -> String {
    if instance_id.starts_with(RELEASE_PREFIX) {
        return instance_id.to_string();
    }

    let sanitized: String = instance_id
        .to_lowercase()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .take(NAME_CHARS)
        .collect();

    format!("{RELEASE_PREFIX}{sanitized}")
}
