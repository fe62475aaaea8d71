//! Storage key constants.

/// Keys under which the session is persisted.
///
/// Each key is prefixed with a namespace so several runtimes (for example
/// one per tenant) can share a backend.
pub struct StorageKeys;

impl StorageKeys {
    /// Access token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Session metadata (JSON: expiry and token type)
    pub const SESSION_META: &'static str = "session_meta";

    /// Build the namespaced form of a key, e.g. `identity.access_token`.
    pub fn namespaced(namespace: &str, key: &str) -> String {
        format!("{}.{}", namespace, key)
    }
}
