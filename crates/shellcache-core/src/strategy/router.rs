use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::cache::CacheStoreManager;
use crate::config::RoutingConfig;
use crate::net::{Fetcher, Request};

use super::{cache_first, network_first, Served, Strategy};

/// Result of offering a request to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Not intercepted; the platform performs the request itself
    Passthrough,
    Handled { strategy: Strategy, served: Served },
}

/// Classifies requests by URL and dispatches them to a fetch strategy.
#[derive(Clone)]
pub struct Router {
    static_assets: Regex,
    dynamic_data: Regex,
    timeout: Duration,
    manager: CacheStoreManager,
    fetcher: Arc<dyn Fetcher>,
}

impl Router {
    pub fn new(
        config: &RoutingConfig,
        manager: CacheStoreManager,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            static_assets: Regex::new(&config.static_asset_pattern)?,
            dynamic_data: Regex::new(&config.dynamic_pattern)?,
            timeout: config.network_timeout(),
            manager,
            fetcher,
        })
    }

    /// Pick a strategy: static assets by path extension, then API/data by
    /// URL, then cache-first for everything else.
    pub fn classify(&self, url: &Url) -> Strategy {
        if self.static_assets.is_match(url.path()) {
            Strategy::CacheFirst
        } else if self.dynamic_data.is_match(url.as_str()) {
            Strategy::NetworkFirst
        } else {
            Strategy::CacheFirst
        }
    }

    pub async fn handle(&self, request: &Request) -> RouteOutcome {
        if !request.is_http() || !request.is_get() {
            debug!(url = %request.url, method = %request.method, "Passing request through");
            return RouteOutcome::Passthrough;
        }

        let strategy = self.classify(&request.url);
        let served = match strategy {
            Strategy::CacheFirst => {
                cache_first(&self.manager, self.fetcher.as_ref(), request, self.timeout).await
            }
            Strategy::NetworkFirst => {
                network_first(&self.manager, self.fetcher.as_ref(), request, self.timeout).await
            }
        };
        debug!(
            url = %request.url,
            strategy = %strategy,
            source = %served.source,
            status = served.response.status,
            "Request served"
        );
        RouteOutcome::Handled { strategy, served }
    }
}
