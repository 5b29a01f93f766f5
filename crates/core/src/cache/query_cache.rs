use dashmap::DashMap;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Result;

/// Independent invalidation scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Tree reads: nodes, ancestors, descendants, depth, materialized tree.
    Categories,
    /// Association reads.
    Categorizables,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Categories => "categories",
            CacheNamespace::Categorizables => "categorizables",
        }
    }
}

/// Deterministic fingerprint of a read query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    fingerprint: String,
}

impl CacheKey {
    /// Hashes `operation` and the JSON form of `args` within `namespace`.
    pub fn new<A: Serialize + ?Sized>(
        namespace: CacheNamespace,
        operation: &str,
        args: &A,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(operation.as_bytes());
        hasher.update(b"|");
        // Keys are built from plain argument tuples, which always serialize.
        if let Ok(encoded) = serde_json::to_vec(args) {
            hasher.update(&encoded);
        }
        Self {
            namespace,
            fingerprint: hex::encode(hasher.finalize()),
        }
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Storage for cached query results.
pub trait QueryCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<serde_json::Value>;
    fn put(&self, key: CacheKey, value: serde_json::Value);
    fn invalidate_namespace(&self, namespace: CacheNamespace);
    fn invalidate_all(&self);
}

/// Cache that never stores anything.
#[derive(Clone, Default)]
pub struct NoOpQueryCache;

impl QueryCache for NoOpQueryCache {
    fn get(&self, _key: &CacheKey) -> Option<serde_json::Value> {
        None
    }

    fn put(&self, _key: CacheKey, _value: serde_json::Value) {}

    fn invalidate_namespace(&self, _namespace: CacheNamespace) {}

    fn invalidate_all(&self) {}
}

/// Process-local cache without expiry; entries live until invalidated.
#[derive(Default)]
pub struct InMemoryQueryCache {
    entries: DashMap<CacheKey, serde_json::Value>,
}

impl InMemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl QueryCache for InMemoryQueryCache {
    fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: CacheKey, value: serde_json::Value) {
        self.entries.insert(key, value);
    }

    fn invalidate_namespace(&self, namespace: CacheNamespace) {
        self.entries.retain(|key, _| key.namespace != namespace);
    }

    fn invalidate_all(&self) {
        self.entries.clear();
    }
}

/// Returns the cached value for `key`, or runs `load` and caches its result.
///
/// Errors from `load` are returned and never cached.
pub fn cached<T, F>(cache: &dyn QueryCache, key: CacheKey, load: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    if let Some(hit) = cache.get(&key) {
        match serde_json::from_value(hit) {
            Ok(value) => {
                debug!("Query cache hit {}", key.fingerprint());
                return Ok(value);
            }
            Err(e) => debug!("Discarding unreadable cache entry {}: {}", key.fingerprint(), e),
        }
    }

    let value = load()?;
    match serde_json::to_value(&value) {
        Ok(json) => cache.put(key, json),
        Err(e) => debug!("Skipping cache write for {}: {}", key.fingerprint(), e),
    }
    Ok(value)
}
