//! Request classification and the two resource-fetch algorithms.
//!
//! Every intercepted HTTP GET is classified by URL pattern and answered by
//! either the cache-first or the network-first strategy. Both write
//! successful network responses into the dynamic generation, and neither
//! ever returns an error: failures degrade to a cached copy or a synthetic
//! 503.

pub mod cache_first;
pub mod network_first;
pub mod router;

use std::fmt;
use std::time::Duration;

use crate::error::FetchError;
use crate::net::{Fetcher, Request, ResponseSnapshot};

pub use cache_first::cache_first;
pub use network_first::network_first;
pub use router::{RouteOutcome, Router};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::CacheFirst => write!(f, "cache-first"),
            Strategy::NetworkFirst => write!(f, "network-first"),
        }
    }
}

/// Where a response handed back to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
    /// Cached root document served in place of a failed navigation
    ShellFallback,
    /// Synthetic 503
    Offline,
}

impl fmt::Display for ServedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServedFrom::Cache => write!(f, "cache"),
            ServedFrom::Network => write!(f, "network"),
            ServedFrom::ShellFallback => write!(f, "shell fallback"),
            ServedFrom::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: ResponseSnapshot,
    pub source: ServedFrom,
}

impl Served {
    pub fn new(response: ResponseSnapshot, source: ServedFrom) -> Self {
        Self { response, source }
    }

    pub fn offline() -> Self {
        Self::new(ResponseSnapshot::offline(), ServedFrom::Offline)
    }
}

/// Fetch with an upper bound; expiry counts as a network failure.
pub(crate) async fn fetch_bounded(
    fetcher: &dyn Fetcher,
    request: &Request,
    timeout: Duration,
) -> Result<ResponseSnapshot, FetchError> {
    match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}
