//! In-memory image cache bounded by a byte budget.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::DynamicImage;
use lru::LruCache;
use tracing::{debug, trace};

/// Default memory budget (64 MiB).
pub const DEFAULT_MEMORY_BUDGET: usize = 64 * 1024 * 1024;

/// Thread-safe cache of decoded images keyed by source URL.
///
/// Entries are weighed by their decoded pixel buffer. Inserting past the
/// budget evicts least-recently-used entries until the total fits again.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    budget: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct Inner {
    entries: LruCache<String, Arc<DynamicImage>>,
    size: usize,
}

impl Inner {
    fn remove(&mut self, url: &str) -> bool {
        match self.entries.pop(url) {
            Some(old) => {
                self.size -= image_size(&old);
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_BUDGET)
    }
}

impl MemoryCache {
    /// Create a cache holding at most `budget` bytes of pixels.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                size: 0,
            }),
            budget,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get an image, marking it most recently used.
    pub fn get(&self, url: &str) -> Option<Arc<DynamicImage>> {
        let found = self.lock().entries.get(url).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, "Memory cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, "Memory cache miss");
        }
        found
    }

    /// Store an image, replacing any previous entry for the URL.
    ///
    /// Images larger than the whole budget are not kept.
    pub fn put(&self, url: &str, image: Arc<DynamicImage>) {
        let size = image_size(&image);
        let mut inner = self.lock();
        inner.remove(url);

        if size > self.budget {
            debug!(url = %url, size, budget = self.budget, "Image exceeds memory budget, not caching");
            return;
        }

        inner.entries.put(url.to_string(), image);
        inner.size += size;

        while inner.size > self.budget {
            let Some((evicted, old)) = inner.entries.pop_lru() else {
                break;
            };
            inner.size -= image_size(&old);
            trace!(url = %evicted, "Evicted from memory cache");
        }
    }

    /// Get an image without counting a hit or miss.
    ///
    /// Still marks the entry most recently used.
    pub fn get_uncounted(&self, url: &str) -> Option<Arc<DynamicImage>> {
        self.lock().entries.get(url).cloned()
    }

    /// Check for an entry without touching its recency.
    pub fn contains(&self, url: &str) -> bool {
        self.lock().entries.contains(url)
    }

    /// Drop a single entry.
    pub fn remove(&self, url: &str) -> bool {
        self.lock().remove(url)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.size = 0;
        debug!("Cleared memory image cache");
    }

    /// Number of cached images.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no images.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Bytes currently held.
    pub fn size_bytes(&self) -> usize {
        self.lock().size
    }

    /// Configured byte budget.
    pub const fn budget_bytes(&self) -> usize {
        self.budget
    }

    /// Snapshot of cache counters.
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let inner = self.lock();
        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            entries: inner.entries.len(),
            size_bytes: inner.size,
            budget_bytes: self.budget,
        }
    }
}

/// Bytes taken by a decoded image.
pub fn image_size(image: &DynamicImage) -> usize {
    image.as_bytes().len()
}

/// Memory cache counters.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Lookups that found an image.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Cached images.
    pub entries: usize,
    /// Bytes held.
    pub size_bytes: usize,
    /// Byte budget.
    pub budget_bytes: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} images, {}/{} bytes, {:.1}% hit rate ({} hits, {} misses)",
            self.entries, self.size_bytes, self.budget_bytes, self.hit_rate, self.hits, self.misses
        )
    }
}
