//! In-memory cache storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreResult;

use super::storage::validate_generation_name;
use super::{CacheStorage, CachedEntry, RequestKey};

#[derive(Debug, Default)]
struct Generations {
    /// Creation order, mirrored by `entries`' keys
    order: Vec<String>,
    entries: HashMap<String, HashMap<RequestKey, CachedEntry>>,
}

impl Generations {
    fn ensure(&mut self, generation: &str) -> &mut HashMap<RequestKey, CachedEntry> {
        if !self.entries.contains_key(generation) {
            self.order.push(generation.to_string());
        }
        self.entries.entry(generation.to_string()).or_default()
    }
}

/// Cache storage that lives for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<Generations>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all generations.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.values().map(HashMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn generations(&self) -> StoreResult<Vec<String>> {
        Ok(self.inner.read().await.order.clone())
    }

    async fn open(&self, generation: &str) -> StoreResult<()> {
        validate_generation_name(generation)?;
        self.inner.write().await.ensure(generation);
        Ok(())
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> StoreResult<Option<CachedEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .entries
            .get(generation)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, generation: &str, key: RequestKey, entry: CachedEntry) -> StoreResult<()> {
        validate_generation_name(generation)?;
        self.inner.write().await.ensure(generation).insert(key, entry);
        Ok(())
    }

    async fn put_all(
        &self,
        generation: &str,
        entries: Vec<(RequestKey, CachedEntry)>,
    ) -> StoreResult<()> {
        validate_generation_name(generation)?;
        let mut inner = self.inner.write().await;
        inner.ensure(generation).extend(entries);
        Ok(())
    }

    async fn keys(&self, generation: &str) -> StoreResult<Vec<RequestKey>> {
        let inner = self.inner.read().await;
        let mut keys: Vec<RequestKey> = inner
            .entries
            .get(generation)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn delete_generation(&self, generation: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let existed = inner.entries.remove(generation).is_some();
        inner.order.retain(|name| name != generation);
        if existed {
            debug!(generation, "Deleted in-memory cache generation");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ResponseSnapshot;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse(&format!("https://app.test{path}")).unwrap())
    }

    #[tokio::test]
    async fn test_put_creates_generation_lazily() {
        let storage = MemoryStorage::new();
        assert!(storage.generations().await.unwrap().is_empty());

        storage
            .put("dynamic-v1", key("/a"), CachedEntry::new(ResponseSnapshot::ok("a")))
            .await
            .unwrap();

        assert_eq!(storage.generations().await.unwrap(), vec!["dynamic-v1"]);
        let entry = storage.get("dynamic-v1", &key("/a")).await.unwrap().unwrap();
        assert_eq!(entry.response.text(), "a");
        assert!(storage.get("static-v1", &key("/a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generations_keep_creation_order() {
        let storage = MemoryStorage::new();
        storage.open("static-v1").await.unwrap();
        storage.open("root-v1").await.unwrap();
        storage.open("static-v1").await.unwrap();
        assert_eq!(storage.generations().await.unwrap(), vec!["static-v1", "root-v1"]);
    }

    #[tokio::test]
    async fn test_delete_generation_is_idempotent() {
        let storage = MemoryStorage::new();
        storage
            .put("static-v1", key("/"), CachedEntry::new(ResponseSnapshot::ok("shell")))
            .await
            .unwrap();

        assert!(storage.delete_generation("static-v1").await.unwrap());
        assert!(!storage.delete_generation("static-v1").await.unwrap());
        assert!(storage.is_empty().await);
        assert!(storage.generations().await.unwrap().is_empty());
    }
}
