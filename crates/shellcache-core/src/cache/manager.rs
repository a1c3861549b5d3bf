use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{StoreError, StoreResult};
use crate::net::{Fetcher, Request, ResponseSnapshot};

use super::{Bucket, CacheStorage, CachedEntry, GenerationSet, RequestKey};

/// Owns the named cache generations and their install/activate lifecycle.
#[derive(Clone)]
pub struct CacheStoreManager {
    storage: Arc<dyn CacheStorage>,
    generations: GenerationSet,
    manifest: Vec<Url>,
    root_document: Url,
}

/// Summary of a completed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    pub entries: usize,
}

impl CacheStoreManager {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        generations: GenerationSet,
        manifest: Vec<Url>,
        root_document: Url,
    ) -> Self {
        Self {
            storage,
            generations,
            manifest,
            root_document,
        }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn generations(&self) -> &GenerationSet {
        &self.generations
    }

    /// Pre-fetch the install manifest into the static generation.
    ///
    /// All fetches must succeed before anything is written; a failure leaves
    /// the store untouched so the install can simply be retried.
    pub async fn install(&self, fetcher: &dyn Fetcher) -> StoreResult<InstallReport> {
        let static_name = self.generations.static_name();
        info!(generation = %static_name, resources = self.manifest.len(), "Installing cache");

        let fetches = self.manifest.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = fetcher.fetch(&request).await.map_err(|e| StoreError::Install {
                path: url.path().to_string(),
                reason: e.to_string(),
            })?;
            if !response.is_success() {
                return Err(StoreError::Install {
                    path: url.path().to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            Ok::<_, StoreError>((RequestKey::from(&request), CachedEntry::new(response)))
        });
        let entries = try_join_all(fetches).await?;

        let root_key = RequestKey::get(&self.root_document);
        let root_entry = entries
            .iter()
            .find(|(key, _)| *key == root_key)
            .map(|(_, entry)| entry.clone());

        let count = entries.len();
        self.storage.open(&static_name).await?;
        self.storage.put_all(&static_name, entries).await?;

        if let Some(entry) = root_entry {
            self.storage
                .put(&self.generations.root_name(), root_key, entry)
                .await?;
        } else {
            warn!(url = %self.root_document, "Root document is not in the install manifest");
        }

        info!(generation = %static_name, entries = count, "Cache installed");
        Ok(InstallReport {
            generation: static_name,
            entries: count,
        })
    }

    /// Delete every stored generation that is not current.
    ///
    /// Current generations are never touched, so reads racing with activation
    /// from other contexts keep being served.
    pub async fn activate(&self) -> StoreResult<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.generations().await? {
            if self.generations.contains(&name) {
                continue;
            }
            if self.storage.delete_generation(&name).await? {
                info!(generation = %name, "Deleted stale cache generation");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Look a request up in any stored generation, current ones first.
    pub async fn match_any(&self, key: &RequestKey) -> StoreResult<Option<CachedEntry>> {
        let current = self.generations.names();
        for name in &current {
            if let Some(entry) = self.storage.get(name, key).await? {
                return Ok(Some(entry));
            }
        }
        for name in self.storage.generations().await? {
            if current.contains(&name) {
                continue;
            }
            if let Some(entry) = self.storage.get(&name, key).await? {
                debug!(generation = %name, url = %key.url, "Served from stale generation");
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    pub async fn put_dynamic(&self, key: RequestKey, response: ResponseSnapshot) -> StoreResult<()> {
        self.storage
            .put(&self.generations.dynamic_name(), key, CachedEntry::new(response))
            .await
    }

    /// The application shell for offline navigations.
    pub async fn root_document(&self) -> StoreResult<Option<CachedEntry>> {
        let key = RequestKey::get(&self.root_document);
        for bucket in [Bucket::Root, Bucket::Static] {
            let name = self.generations.get(bucket).name();
            if let Some(entry) = self.storage.get(&name, &key).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Delete every generation, current or not. Returns the deleted names.
    pub async fn purge_all(&self) -> StoreResult<Vec<String>> {
        purge_all(self.storage.as_ref()).await
    }
}

/// Delete every stored generation. Deleting an already-missing one is a no-op.
pub async fn purge_all(storage: &dyn CacheStorage) -> StoreResult<Vec<String>> {
    let mut deleted = Vec::new();
    for name in storage.generations().await? {
        if storage.delete_generation(&name).await? {
            deleted.push(name);
        }
    }
    Ok(deleted)
}
