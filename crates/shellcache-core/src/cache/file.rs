//! File-backed cache storage.
//!
//! Layout: one directory per generation, two files per entry:
//!
//! ```text
//! <root>/<generation>/.created          creation timestamp (RFC 3339)
//! <root>/<generation>/<sha256>.meta          JSON: request key, response head, body file name
//! <root>/<generation>/<sha256>.<n>.body      raw response body of one write
//! ```
//!
//! An entry exists once its `.meta` file is in place. Every write gets its
//! own body file and the meta is renamed over the old one last, so a reader
//! never sees the head of one write paired with the body of another.
//! Generations are deleted by renaming the directory out of the way before
//! removing it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::StoreResult;

use super::storage::validate_generation_name;
use super::{CacheStorage, CachedEntry, RequestKey};

const CREATED_MARKER: &str = ".created";
const TRASH_PREFIX: &str = ".trash-";

/// Per-process write counter; with the pid it makes temp and body names unique
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

fn write_id() -> String {
    format!("{}-{}", std::process::id(), WRITE_SEQ.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    /// File name of the body written together with this meta
    body: String,
    entry: CachedEntry,
}

impl EntryMeta {
    fn body_path(&self, dir: &Path) -> Option<PathBuf> {
        let plain = Path::new(&self.body).file_name().is_some_and(|n| n == self.body.as_str());
        plain.then(|| dir.join(&self.body))
    }
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &str) -> StoreResult<PathBuf> {
        validate_generation_name(generation)?;
        Ok(self.root.join(generation))
    }

    fn meta_path(dir: &Path, key: &RequestKey) -> PathBuf {
        dir.join(format!("{}.meta", key.digest()))
    }

    fn body_name(key: &RequestKey) -> String {
        format!("{}.{}.body", key.digest(), write_id())
    }

    async fn ensure_dir(&self, generation: &str) -> StoreResult<PathBuf> {
        let dir = self.generation_dir(generation)?;
        fs::create_dir_all(&dir).await?;
        let marker = dir.join(CREATED_MARKER);
        if !fs::try_exists(&marker).await? {
            fs::write(&marker, Utc::now().to_rfc3339()).await?;
        }
        Ok(dir)
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> StoreResult<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}.tmp", write_id()));
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_meta(path: &Path) -> Option<EntryMeta> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // The generation may have been deleted between the check and the read
                debug!(path = ?path, error = %e, "Cache metadata vanished");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to parse cache metadata");
                None
            }
        }
    }

    async fn created_at(dir: &Path) -> Option<DateTime<Utc>> {
        let contents = fs::read_to_string(dir.join(CREATED_MARKER)).await.ok()?;
        DateTime::parse_from_rfc3339(contents.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[async_trait]
impl CacheStorage for FileStorage {
    async fn generations(&self) -> StoreResult<Vec<String>> {
        let mut found = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if validate_generation_name(&name).is_err() {
                continue;
            }
            let created = Self::created_at(&entry.path()).await;
            found.push((created, name));
        }
        // Unknown creation times sort first, ties by name
        found.sort();
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }

    async fn open(&self, generation: &str) -> StoreResult<()> {
        self.ensure_dir(generation).await?;
        Ok(())
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> StoreResult<Option<CachedEntry>> {
        let dir = self.generation_dir(generation)?;
        let meta_path = Self::meta_path(&dir, key);
        if !fs::try_exists(&meta_path).await? {
            return Ok(None);
        }

        let Some(meta) = Self::read_meta(&meta_path).await else {
            return Ok(None);
        };
        if meta.key != *key {
            warn!(path = ?meta_path, "Cache digest collision, ignoring entry");
            return Ok(None);
        }

        let Some(body_path) = meta.body_path(&dir) else {
            warn!(path = ?meta_path, body = %meta.body, "Cache metadata names an invalid body file");
            return Ok(None);
        };
        let body = match fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) => {
                debug!(path = ?meta_path, error = %e, "Cache body missing");
                return Ok(None);
            }
        };

        let mut entry = meta.entry;
        entry.response.body = body;
        Ok(Some(entry))
    }

    async fn put(&self, generation: &str, key: RequestKey, entry: CachedEntry) -> StoreResult<()> {
        let dir = self.ensure_dir(generation).await?;
        let meta_path = Self::meta_path(&dir, &key);
        let previous = if fs::try_exists(&meta_path).await? {
            Self::read_meta(&meta_path).await
        } else {
            None
        };

        let body = Self::body_name(&key);
        fs::write(dir.join(&body), &entry.response.body).await?;
        let meta = serde_json::to_vec(&EntryMeta { key, body, entry })?;
        Self::write_atomic(&meta_path, &meta).await?;

        // The replaced body; a concurrent writer may already have removed it
        if let Some(old) = previous.as_ref().and_then(|m| m.body_path(&dir)) {
            if let Err(e) = fs::remove_file(&old).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = ?old, error = %e, "Failed to remove replaced cache body");
                }
            }
        }
        Ok(())
    }

    async fn keys(&self, generation: &str) -> StoreResult<Vec<RequestKey>> {
        let dir = self.generation_dir(generation)?;
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("meta") {
                continue;
            }
            match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<EntryMeta>(&bytes) {
                    Ok(meta) => keys.push(meta.key),
                    Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable cache entry"),
                },
                Err(e) => debug!(path = ?path, error = %e, "Cache entry vanished while listing"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete_generation(&self, generation: &str) -> StoreResult<bool> {
        let dir = self.generation_dir(generation)?;
        if !fs::try_exists(&dir).await? {
            return Ok(false);
        }

        let trash = self.root.join(format!(
            "{TRASH_PREFIX}{generation}-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        match fs::rename(&dir, &trash).await {
            Ok(()) => {}
            // Another context deleted it first
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        fs::remove_dir_all(&trash).await?;
        debug!(generation, "Deleted cache generation directory");
        Ok(true)
    }
}
