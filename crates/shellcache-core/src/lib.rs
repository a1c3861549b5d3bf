//! shellcache core - offline caching and update orchestration for a web
//! application shell.
//!
//! Two halves share this crate. The background worker ([`worker`]) keeps
//! versioned caches of the application shell and its data, answers every
//! intercepted request from cache or network, and turns push messages into
//! notifications. The foreground side ([`update`]) polls for newer builds
//! and, on request, purges the caches and reloads onto the new version.
//!
//! Everything outside the process (network, windows, notifications, page
//! location) sits behind the traits in [`net`] and [`host`].

pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod net;
pub mod notify;
pub mod strategy;
pub mod update;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::ShellConfig;
pub use error::{FetchError, HostError, StateError, StoreError, UpdateError, WorkerError};
pub use worker::BackgroundWorker;
