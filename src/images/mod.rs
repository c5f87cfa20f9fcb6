//! Thumbnail loading and caching.
//!
//! This module downloads room photos, keeps decoded images in a byte-bounded
//! memory cache and raw bytes in a file cache, and hands finished images back
//! to the UI through a [`Dispatcher`] that drops results for recycled rows.

mod dispatcher;
mod error;
mod fetcher;
mod file_cache;
mod loader;
mod memory_cache;
mod targets;

pub use dispatcher::{Delivery, Dispatcher};
pub use error::LoadError;
pub use fetcher::{DEFAULT_TIMEOUT_SECS, HttpFetcher, ImageFetcher};
pub use file_cache::{FileCache, cache_key};
pub use loader::{ImageLoader, Thumbnail};
pub use memory_cache::{CacheStats, DEFAULT_MEMORY_BUDGET, MemoryCache, image_size};
pub use targets::{TargetId, Targets};
