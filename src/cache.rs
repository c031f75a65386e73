use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use sha1::{Digest, Sha1};

/// Result type of [`ConfigCache`] operations.
pub type CacheResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Persistent storage for the serialized config entry.
///
/// The SDK treats the cache as an untrusted external resource: errors are logged and the SDK
/// falls back to its in-memory state. The cache may be shared between processes, so the SDK
/// compares ETags instead of assuming exclusive access.
///
/// ```
/// # use configcat::{CacheResult, ConfigCache};
/// struct NoCache;
///
/// impl ConfigCache for NoCache {
///     fn read(&self, _key: &str) -> CacheResult<Option<String>> {
///         Ok(None)
///     }
///
///     fn write(&self, _key: &str, _value: &str) -> CacheResult<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait ConfigCache: Send + Sync {
    /// Read the value stored under `key`. `Ok(None)` if nothing is stored.
    fn read(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`.
    fn write(&self, key: &str, value: &str) -> CacheResult<()>;
}

/// Cache that stores nothing. This is the default.
#[derive(Debug, Default)]
pub struct NullConfigCache;

impl ConfigCache for NullConfigCache {
    fn read(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    fn write(&self, _key: &str, _value: &str) -> CacheResult<()> {
        Ok(())
    }
}

/// Process-local cache, mostly useful to share config between clients and for tests.
#[derive(Debug, Default)]
pub struct InMemoryConfigCache {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryConfigCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigCache for InMemoryConfigCache {
    fn read(&self, key: &str) -> CacheResult<Option<String>> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Cache key for the given SDK key. Stable across SDKs so that they can share a cache.
pub(crate) fn cache_key(sdk_key: &str) -> String {
    hex::encode(Sha1::digest(format!("{sdk_key}_config_v6.json_v2")))
}
