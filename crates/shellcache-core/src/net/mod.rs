//! Network access for the background worker.
//!
//! `Fetcher` is the seam every strategy goes through; `HttpFetcher` is the
//! reqwest-backed implementation used outside of tests.

pub mod client;
pub mod types;

pub use client::{Fetcher, HttpFetcher};
pub use types::{Request, RequestMode, ResponseSnapshot};
