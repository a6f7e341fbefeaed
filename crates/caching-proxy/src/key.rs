//! Cache key derivation

use sha2::{Digest, Sha256};

const SEPARATOR: &str = "|";

/// Generate a cache key for a request.
///
/// The key is the hex SHA-256 of the request URI (path and query). With
/// `unique_by_user`, the `User-Agent` and `Cookie` values are appended when
/// present, so different users get different entries. The request method is
/// not part of the key.
pub fn derive_key(
    uri: &str,
    unique_by_user: bool,
    user_agent: Option<&str>,
    cookie: Option<&str>,
) -> String {
    let mut parts = vec![uri];

    if unique_by_user {
        parts.extend(user_agent.filter(|ua| !ua.is_empty()));
        parts.extend(cookie.filter(|c| !c.is_empty()));
    }

    let mut hasher = Sha256::new();
    hasher.update(parts.join(SEPARATOR).as_bytes());
    hex::encode(hasher.finalize())
}
