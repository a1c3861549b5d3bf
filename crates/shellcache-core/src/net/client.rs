//! HTTP client used by the fetch strategies and the version sources.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use tracing::debug;

use crate::error::FetchError;

use super::{Request, ResponseSnapshot};

/// HTTP request timeout in seconds.
/// Strategies apply their own, shorter bound on top of this one.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Performs a network round-trip for an intercepted request.
///
/// Non-success HTTP statuses are returned as `Ok`; only transport failures
/// (offline, DNS, TLS, reset) are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, FetchError>;
}

/// Fetcher backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn headers(request: &Request) -> Result<header::HeaderMap, FetchError> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidResponse(format!("bad header name: {e}")))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidResponse(format!("bad header value: {e}")))?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, FetchError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| FetchError::InvalidResponse(format!("bad method: {e}")))?;

        let response = self
            .client
            .request(method, request.url.clone())
            .headers(Self::headers(request)?)
            .send()
            .await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status = status.as_u16(), bytes = body.len(), "Fetched");

        Ok(ResponseSnapshot {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
