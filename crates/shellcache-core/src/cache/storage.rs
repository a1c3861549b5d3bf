use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

use super::{CachedEntry, RequestKey};

/// Generation-scoped store of cached responses.
///
/// Each generation is an independent namespace. Deleting a generation must be
/// atomic with respect to concurrent readers: a reader sees either the whole
/// generation or none of it.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of all stored generations, in creation order.
    async fn generations(&self) -> StoreResult<Vec<String>>;

    /// Create the generation if it does not exist yet.
    async fn open(&self, generation: &str) -> StoreResult<()>;

    async fn get(&self, generation: &str, key: &RequestKey) -> StoreResult<Option<CachedEntry>>;

    /// Write one entry, creating the generation lazily. Overwrites.
    async fn put(&self, generation: &str, key: RequestKey, entry: CachedEntry) -> StoreResult<()>;

    /// Write many entries into one generation.
    async fn put_all(
        &self,
        generation: &str,
        entries: Vec<(RequestKey, CachedEntry)>,
    ) -> StoreResult<()> {
        for (key, entry) in entries {
            self.put(generation, key, entry).await?;
        }
        Ok(())
    }

    async fn keys(&self, generation: &str) -> StoreResult<Vec<RequestKey>>;

    /// Remove a whole generation. Returns `false` when it did not exist.
    async fn delete_generation(&self, generation: &str) -> StoreResult<bool>;
}

/// Generation names double as directory names in the file store.
pub fn validate_generation_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidGeneration(name.to_string()))
    }
}
