//! Cache key composition.

/// Separator between the user and post components of a cache key.
pub const KEY_DELIMITER: char = '#';

/// Compose the cache key for a `(user_id, post_id)` pair.
///
/// The user component is prefixed with its byte length (`<len>:<user_id>#<post_id>`),
/// so the key stays unambiguous when either component contains the delimiter.
/// Used only by caches; stores key by the native composite pair.
pub fn create_key(user_id: &str, post_id: &str) -> String {
    format!("{}:{user_id}{KEY_DELIMITER}{post_id}", user_id.len())
}
