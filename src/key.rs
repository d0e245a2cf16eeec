//! Canonical cache keys
//!
//! A key joins category, sub-category and model name with [`KEY_SEPARATOR`],
//! e.g. `"Text Encoder Models::UMT5 XXL Models::UMT5 XXL FP16"`.

/// Reserved separator between the three key components
pub const KEY_SEPARATOR: &str = "::";

/// Derive the canonical cache key for a catalog triple
///
/// Pure and total. Fields failing [`is_key_component`] are not rejected here;
/// catalog validation does that before keys are compared.
pub fn derive_key(category: &str, sub_category: &str, name: &str) -> String {
    let mut key = String::with_capacity(
        category.len() + sub_category.len() + name.len() + 2 * KEY_SEPARATOR.len(),
    );
    key.push_str(category);
    key.push_str(KEY_SEPARATOR);
    key.push_str(sub_category);
    key.push_str(KEY_SEPARATOR);
    key.push_str(name);
    key
}

/// Whether a value can be used as a key component
///
/// A component must not contain [`KEY_SEPARATOR`] and must not start or end
/// with `:`, otherwise a separator forms across the boundary
/// (`"a:" + "::" + "b"` reads as `"a" + "::" + ":b"`).
pub fn is_key_component(value: &str) -> bool {
    !value.contains(KEY_SEPARATOR) && !value.starts_with(':') && !value.ends_with(':')
}

/// Split a key back into its three components
///
/// Returns `None` for keys that do not have exactly three components.
pub fn split_key(key: &str) -> Option<(&str, &str, &str)> {
    let mut parts = key.splitn(3, KEY_SEPARATOR);
    let category = parts.next()?;
    let sub_category = parts.next()?;
    let name = parts.next()?;
    if name.contains(KEY_SEPARATOR) {
        return None;
    }
    Some((category, sub_category, name))
}
