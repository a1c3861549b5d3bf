use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheStoreManager, RequestKey};
use crate::net::{Fetcher, Request};

use super::{fetch_bounded, Served, ServedFrom};

/// Prefer the network; the cache only answers when the network cannot.
pub async fn network_first(
    manager: &CacheStoreManager,
    fetcher: &dyn Fetcher,
    request: &Request,
    timeout: Duration,
) -> Served {
    let key = RequestKey::from(request);

    let error = match fetch_bounded(fetcher, request, timeout).await {
        Ok(response) => {
            if response.is_success() {
                if let Err(e) = manager.put_dynamic(key, response.clone()).await {
                    warn!(url = %request.url, error = %e, "Failed to cache response");
                }
            }
            return Served::new(response, ServedFrom::Network);
        }
        Err(e) => e,
    };

    debug!(url = %request.url, error = %error, "Network failed, falling back to cache");
    match manager.match_any(&key).await {
        Ok(Some(entry)) => Served::new(entry.response, ServedFrom::Cache),
        Ok(None) => Served::offline(),
        Err(e) => {
            warn!(url = %request.url, error = %e, "Cache fallback lookup failed");
            Served::offline()
        }
    }
}
