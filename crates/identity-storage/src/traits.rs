//! Storage trait definitions.

use crate::StorageResult;

/// Key/value backend for persisted session data.
///
/// Implementations must be safe to share between threads. Callers treat
/// write failures as non-fatal, so backends should report errors rather
/// than panic.
pub trait PersistedStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
