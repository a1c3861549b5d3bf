use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheStoreManager, RequestKey};
use crate::net::{Fetcher, Request};

use super::{fetch_bounded, Served, ServedFrom};

/// Serve from any cache generation; go to the network only on a miss.
///
/// A successful network response is copied into the dynamic generation so
/// the next request for the same URL never leaves the process.
pub async fn cache_first(
    manager: &CacheStoreManager,
    fetcher: &dyn Fetcher,
    request: &Request,
    timeout: Duration,
) -> Served {
    let key = RequestKey::from(request);

    match manager.match_any(&key).await {
        Ok(Some(entry)) => {
            debug!(url = %request.url, "Cache hit");
            return Served::new(entry.response, ServedFrom::Cache);
        }
        Ok(None) => {}
        Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed, trying network"),
    }

    match fetch_bounded(fetcher, request, timeout).await {
        Ok(response) => {
            if response.is_success() {
                if let Err(e) = manager.put_dynamic(key, response.clone()).await {
                    warn!(url = %request.url, error = %e, "Failed to cache response");
                }
            }
            Served::new(response, ServedFrom::Network)
        }
        Err(e) => {
            debug!(url = %request.url, error = %e, "Network failed on cache miss");
            if request.is_navigation() {
                match manager.root_document().await {
                    Ok(Some(shell)) => {
                        return Served::new(shell.response, ServedFrom::ShellFallback);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Failed to read root document"),
                }
            }
            Served::offline()
        }
    }
}
