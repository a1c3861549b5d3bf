//! Versioned local caches.
//!
//! Responses live in named generations (`static-v2`, `dynamic-v2`,
//! `root-v2`). Generations are created at install time or lazily on first
//! write and are retired whole when a newer tag activates; there is no
//! per-entry expiry.

pub mod entry;
pub mod file;
pub mod generation;
pub mod manager;
pub mod memory;
pub mod storage;

pub use entry::{CachedEntry, RequestKey};
pub use file::FileStorage;
pub use generation::{Bucket, CacheGeneration, GenerationSet};
pub use manager::{purge_all, CacheStoreManager, InstallReport};
pub use memory::MemoryStorage;
pub use storage::CacheStorage;
