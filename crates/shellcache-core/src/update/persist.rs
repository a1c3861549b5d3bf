//! Durable key/value state that survives reloads.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::StateError;

use super::VersionRecord;

/// Version the page is running.
pub const KEY_VERSION: &str = "app_version";
/// Last successful apply, RFC 3339.
pub const KEY_LAST_UPDATE: &str = "app_last_update";
/// Last successful check, RFC 3339.
pub const KEY_LAST_CHECK: &str = "app_last_check";
/// Latest fetched [`VersionRecord`], as JSON.
pub const KEY_LATEST_VERSION: &str = "app_latest_version";

/// State file name in the storage directory
const STATE_FILE: &str = "update_state.json";

/// String key/value storage owned by the foreground page.
pub trait LocalState: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StateError>;
}

#[derive(Debug, Default)]
pub struct MemoryLocalState {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryLocalState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalState for MemoryLocalState {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileLocalState {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileLocalState {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn read(&self) -> Result<HashMap<String, String>, StateError> {
        let path = self.path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, values: &HashMap<String, String>) -> Result<(), StateError> {
        std::fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(values)?;
        // Writers in this process are serialized by the lock; the pid keeps other processes apart
        let tmp = self.dir.join(format!("{STATE_FILE}.{}.tmp", std::process::id()));
        std::fs::write(&tmp, contents)?;
        std::fs::rename(tmp, self.path())?;
        Ok(())
    }
}

impl LocalState for FileLocalState {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut values = self.read()?;
        values.insert(key.to_string(), value.to_string());
        self.write(&values)
    }
}

/// The update-related values read back at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedUpdate {
    pub version: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub latest: Option<VersionRecord>,
}

impl PersistedUpdate {
    /// Read whatever is there. Unreadable values are logged and treated as absent.
    pub fn load(state: &dyn LocalState) -> Self {
        Self {
            version: read_logged(state, KEY_VERSION),
            last_update: read_logged(state, KEY_LAST_UPDATE).and_then(|s| parse_time(&s)),
            last_check: read_logged(state, KEY_LAST_CHECK).and_then(|s| parse_time(&s)),
            latest: read_logged(state, KEY_LATEST_VERSION)
                .and_then(|s| serde_json::from_str(&s).ok()),
        }
    }
}

/// Record a successful check.
pub fn store_check(
    state: &dyn LocalState,
    at: DateTime<Utc>,
    latest: &VersionRecord,
) -> Result<(), StateError> {
    state.set(KEY_LAST_CHECK, &at.to_rfc3339())?;
    state.set(KEY_LATEST_VERSION, &serde_json::to_string(latest)?)
}

/// Record that `version` is now the running version.
pub fn store_applied(state: &dyn LocalState, version: &str, at: DateTime<Utc>) -> Result<(), StateError> {
    state.set(KEY_VERSION, version)?;
    state.set(KEY_LAST_UPDATE, &at.to_rfc3339())
}

fn read_logged(state: &dyn LocalState, key: &str) -> Option<String> {
    match state.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Failed to read persisted update state");
            None
        }
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
