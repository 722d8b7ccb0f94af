//! # Key Space
//!
//! Keys are `/`-delimited paths. Listing is segment-aware: `/foo` covers
//! `/foo` itself and `/foo/bar`, but not `/foobar`.

use crate::constants::KEY_SEPARATOR;

/// Get the part of `key` below `prefix`
///
/// Returns `Some("")` for an exact match, `Some(rest)` when `key` is
/// `prefix/rest`, and `None` otherwise.
#[must_use]
pub fn relative_key<'k>(key: &'k str, prefix: &str) -> Option<&'k str> {
    let rest = key.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix(KEY_SEPARATOR)
}

/// Collect the relative keys under `prefix`, in iteration order of `keys`
pub fn list_under<'k, I>(keys: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'k String>,
{
    keys.into_iter()
        .filter_map(|k| relative_key(k, prefix))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_key_is_segment_aware() {
        assert_eq!(relative_key("/foo/bar", "/foo"), Some("bar"));
        assert_eq!(relative_key("/foo/bar/baz", "/foo"), Some("bar/baz"));
        assert_eq!(relative_key("/foobar", "/foo"), None);
        assert_eq!(relative_key("/fo", "/foo"), None);
    }

    #[test]
    fn test_exact_match_maps_to_empty_key() {
        assert_eq!(relative_key("/foo", "/foo"), Some(""));
    }

    #[test]
    fn test_empty_prefix_covers_rooted_keys() {
        assert_eq!(relative_key("/foo", ""), Some("foo"));
        assert_eq!(relative_key("foo", ""), None);
        assert_eq!(relative_key("", ""), Some(""));
    }

    #[test]
    fn test_list_under() {
        let keys = [
            "/foo".to_string(),
            "/foo/bar".to_string(),
            "/foobar".to_string(),
            "/other/foo".to_string(),
        ];

        assert_eq!(list_under(&keys, "/foo"), vec!["", "bar"]);
        assert!(list_under(&keys, "/missing").is_empty());
    }
}
