//! Engine configuration management.
//!
//! This module handles loading and saving the engine configuration: the
//! origin the application is served from, the cache generation tag and
//! install manifest, request classification patterns, update polling
//! timings and notification routes.
//!
//! Configuration is stored at `~/.config/shellcache/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::cache::GenerationSet;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shellcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Images, styles, scripts and fonts.
pub const DEFAULT_STATIC_ASSET_PATTERN: &str =
    r"(?i)\.(png|jpe?g|gif|svg|webp|ico|css|js|mjs|woff2?|ttf)$";

/// API calls, remote data store endpoints and the version metadata document.
pub const DEFAULT_DYNAMIC_PATTERN: &str =
    r"/api/|/rest/v1/|/functions/v1/|/storage/v1/|supabase\.co|/version\.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find {0} directory")]
    MissingDirectory(&'static str),

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid routing pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid URL in config: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid cache version tag: {0}")]
    VersionTag(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub origin: Url,
    pub cache: CacheConfig,
    pub routing: RoutingConfig,
    pub update: UpdateConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Suffix shared by every current generation (`static-v2`, `dynamic-v2`, ...)
    pub version_tag: String,
    /// Absolute paths pre-fetched at install time
    pub manifest: Vec<String>,
    /// Path of the application shell served to offline navigations
    pub root_document: String,
    /// Where the file-backed cache store lives; defaults under the user cache dir
    pub storage_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub static_asset_pattern: String,
    pub dynamic_pattern: String,
    pub network_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Build version bundled with the application, used until one is persisted
    pub app_version: String,
    pub check_interval_secs: u64,
    pub initial_delay_secs: u64,
    pub metadata_path: String,
    pub remote: Option<RemoteSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSourceConfig {
    /// Table endpoint, e.g. `https://xyz.supabase.co/rest/v1/app_versions`
    pub endpoint: Url,
    pub api_key: Option<String>,
    pub software_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub default_title: String,
    pub default_body: String,
    pub default_icon: String,
    pub default_badge: String,
    pub default_tag: String,
    pub vibrate: Vec<u32>,
    pub warehouse_route: String,
    pub calendar_route: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse("http://localhost:8080/").expect("static default origin"),
            cache: CacheConfig::default(),
            routing: RoutingConfig::default(),
            update: UpdateConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version_tag: "v1".to_string(),
            manifest: [
                "/",
                "/index.html",
                "/manifest.json",
                "/icons/icon-192x192.png",
                "/icons/icon-512x512.png",
                "/version.json",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            root_document: "/".to_string(),
            storage_dir: None,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            static_asset_pattern: DEFAULT_STATIC_ASSET_PATTERN.to_string(),
            dynamic_pattern: DEFAULT_DYNAMIC_PATTERN.to_string(),
            network_timeout_secs: 10,
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            check_interval_secs: 300,
            initial_delay_secs: 10,
            metadata_path: "/version.json".to_string(),
            remote: None,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_title: "New notification".to_string(),
            default_body: String::new(),
            default_icon: "/icons/icon-192x192.png".to_string(),
            default_badge: "/icons/icon-72x72.png".to_string(),
            default_tag: "general".to_string(),
            vibrate: vec![200, 100, 200],
            warehouse_route: "/warehouse/checkin".to_string(),
            calendar_route: "/calendar".to_string(),
        }
    }
}

impl RoutingConfig {
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }
}

impl UpdateConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}

impl ShellConfig {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::MissingDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root directory for the file-backed cache store and persisted state.
    pub fn storage_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.cache.storage_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir().ok_or(ConfigError::MissingDirectory("cache"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn generations(&self) -> GenerationSet {
        GenerationSet::new(&self.cache.version_tag)
    }

    /// Resolve an absolute path (or full URL) against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        Ok(self.origin.join(path)?)
    }

    /// Check that patterns compile and the generation tag is usable as a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Regex::new(&self.routing.static_asset_pattern)?;
        Regex::new(&self.routing.dynamic_pattern)?;
        let tag = &self.cache.version_tag;
        if tag.is_empty()
            || !tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ConfigError::VersionTag(tag.clone()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(origin) = std::env::var("SHELLCACHE_ORIGIN") {
            self.origin = Url::parse(&origin)?;
        }
        if let Ok(endpoint) = std::env::var("SHELLCACHE_VERSION_ENDPOINT") {
            let endpoint = Url::parse(&endpoint)?;
            match self.update.remote {
                Some(ref mut remote) => remote.endpoint = endpoint,
                None => {
                    self.update.remote = Some(RemoteSourceConfig {
                        endpoint,
                        api_key: None,
                        software_id: APP_NAME.to_string(),
                    })
                }
            }
        }
        if let Ok(key) = std::env::var("SHELLCACHE_VERSION_API_KEY") {
            if let Some(ref mut remote) = self.update.remote {
                remote.api_key = Some(key);
            }
        }
        Ok(())
    }
}
