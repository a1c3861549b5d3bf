//! Build metadata and where it comes from.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::RemoteSourceConfig;
use crate::error::FetchError;
use crate::net::{Fetcher, Request};

/// Metadata describing one application build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: String,
    #[serde(default, alias = "build_timestamp")]
    pub build_timestamp: String,
    #[serde(default, alias = "release_notes", skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VersionRecord {
    pub fn new(version: impl Into<String>, build_timestamp: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            build_timestamp: build_timestamp.into(),
            release_notes: None,
            features: None,
            description: None,
        }
    }
}

/// Anything that can report the newest published build.
#[async_trait]
pub trait VersionSource: Send + Sync {
    fn name(&self) -> &str;

    async fn latest(&self) -> Result<VersionRecord, FetchError>;
}

/// Row of the remote versions table.
#[derive(Debug, Deserialize)]
struct VersionRow {
    version: String,
    #[serde(default)]
    build_timestamp: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    release_notes: Option<String>,
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(default)]
    description: Option<String>,
}

impl VersionRow {
    fn into_record(self) -> VersionRecord {
        VersionRecord {
            version: self.version,
            build_timestamp: self
                .build_timestamp
                .or(self.release_date)
                .unwrap_or_default(),
            release_notes: self.release_notes,
            features: self.features,
            description: self.description,
        }
    }
}

/// Primary source: the most recent active version row for this software,
/// read from a PostgREST-style table.
#[derive(Clone)]
pub struct RemoteVersionSource {
    client: Client,
    config: RemoteSourceConfig,
}

impl RemoteVersionSource {
    pub fn new(client: Client, config: RemoteSourceConfig) -> Self {
        Self { client, config }
    }

    fn query_url(&self) -> Url {
        let mut url = self.config.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("software_id", &format!("eq.{}", self.config.software_id))
            .append_pair("is_active", "eq.true")
            .append_pair("order", "release_date.desc")
            .append_pair("limit", "1");
        url
    }
}

#[async_trait]
impl VersionSource for RemoteVersionSource {
    fn name(&self) -> &str {
        "remote"
    }

    async fn latest(&self) -> Result<VersionRecord, FetchError> {
        let mut request = self
            .client
            .get(self.query_url())
            .header(header::ACCEPT, "application/json")
            .header(header::CACHE_CONTROL, "no-cache");
        if let Some(ref key) = self.config.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), &body));
        }

        let rows: Vec<VersionRow> = response.json().await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::InvalidResponse("no active version row".to_string()))?;
        let record = row.into_record();
        debug!(version = %record.version, "Remote version fetched");
        Ok(record)
    }
}

/// Fallback source: the static version metadata document shipped with the app.
#[derive(Clone)]
pub struct DocumentVersionSource {
    fetcher: Arc<dyn Fetcher>,
    url: Url,
}

impl DocumentVersionSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, url: Url) -> Self {
        Self { fetcher, url }
    }

    fn request(&self) -> Request {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("_t", &Utc::now().timestamp_millis().to_string());
        Request::get(url)
            .with_header("Cache-Control", "no-cache, no-store, must-revalidate")
            .with_header("Pragma", "no-cache")
    }
}

#[async_trait]
impl VersionSource for DocumentVersionSource {
    fn name(&self) -> &str {
        "document"
    }

    async fn latest(&self) -> Result<VersionRecord, FetchError> {
        let response = self.fetcher.fetch(&self.request()).await?;
        if !response.is_success() {
            return Err(FetchError::from_status(response.status, &response.text()));
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::InvalidResponse(format!("version document: {e}")))
    }
}
