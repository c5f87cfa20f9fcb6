//! Async image loading for list and grid thumbnails.
//!
//! Lookup order is memory, then file cache, then network. Memory hits are
//! answered synchronously from [`ImageLoader::display_image`]; everything else
//! runs as a task on the tokio pool and comes back through the [`Dispatcher`].

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use image::{DynamicImage, ImageReader, Limits};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, trace, warn};

use crate::config::ImageConfig;

use super::dispatcher::{Delivery, Dispatcher};
use super::fetcher::{HttpFetcher, ImageFetcher};
use super::file_cache::FileCache;
use super::memory_cache::{CacheStats, MemoryCache};
use super::targets::{TargetId, Targets};
use super::LoadError;

/// What to show in a target right after requesting an image.
#[derive(Debug, Clone)]
pub enum Thumbnail {
    /// The image was in memory; show it now.
    Ready(Arc<DynamicImage>),
    /// Show the placeholder; the image will arrive through the dispatcher.
    Placeholder,
}

impl Thumbnail {
    /// The image, if it was available immediately.
    pub const fn image(&self) -> Option<&Arc<DynamicImage>> {
        match self {
            Self::Ready(image) => Some(image),
            Self::Placeholder => None,
        }
    }
}

/// Two-tier cached image loader.
///
/// Cloning is cheap; clones share caches, targets and the delivery channel.
#[derive(Clone)]
pub struct ImageLoader {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("memory", &self.shared.memory.stats())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

struct Shared {
    memory: MemoryCache,
    files: FileCache,
    fetcher: Arc<dyn ImageFetcher>,
    targets: Targets,
    permits: Semaphore,
    pending: AtomicUsize,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
    max_dimension: u32,
    decode_limit: u64,
}

impl ImageLoader {
    /// Create a loader around an existing file cache and fetcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &ImageConfig,
        files: FileCache,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> (Self, Dispatcher) {
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let targets = Targets::new();

        let shared = Arc::new(Shared {
            memory: MemoryCache::new(config.memory_budget_bytes),
            files,
            fetcher,
            targets: targets.clone(),
            permits: Semaphore::new(config.max_concurrent_fetches.max(1)),
            pending: AtomicUsize::new(0),
            delivery_tx,
            max_dimension: config.max_dimension,
            decode_limit: config.decode_limit_bytes,
        });

        (Self { shared }, Dispatcher::new(delivery_rx, targets))
    }

    /// Create a loader with an HTTP fetcher and the configured cache directory.
    pub async fn from_config(config: &ImageConfig) -> anyhow::Result<(Self, Dispatcher)> {
        let files = FileCache::new(config.resolved_cache_dir()?).await?;
        let fetcher = HttpFetcher::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(config, files, Arc::new(fetcher)))
    }

    /// Request `url` for `target`.
    ///
    /// The target is re-pointed at `url` even if an earlier request for it is
    /// still in flight; that earlier result will be discarded.
    pub fn display_image(&self, url: &str, target: TargetId) -> Thumbnail {
        self.shared.targets.assign(target, url);

        if let Some(image) = self.shared.memory.get(url) {
            return Thumbnail::Ready(image);
        }

        self.queue(url, Some(target));
        Thumbnail::Placeholder
    }

    /// Warm the caches for `url` without a target.
    pub fn prefetch(&self, url: &str) {
        if !self.shared.memory.contains(url) {
            self.queue(url, None);
        }
    }

    /// Load `url` and wait for it, bypassing targets and the dispatcher.
    ///
    /// Shares the fetch concurrency limit with queued tasks.
    pub async fn load(&self, url: &str) -> Result<Arc<DynamicImage>, LoadError> {
        if let Some(image) = self.shared.memory.get(url) {
            return Ok(image);
        }
        let _permit = self
            .shared
            .permits
            .acquire()
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?;
        // another caller may have finished it while we waited
        if let Some(image) = self.shared.memory.get_uncounted(url) {
            return Ok(image);
        }
        let image = self.shared.load(url).await.inspect_err(|e| self.shared.on_error(url, e))?;
        self.shared.memory.put(url, Arc::clone(&image));
        Ok(image)
    }

    /// Stop wanting anything for `target`. In-flight work for it is discarded.
    pub fn cancel(&self, target: TargetId) {
        if let Some(url) = self.shared.targets.release(target) {
            debug!(target_id = %target, url = %url, "Cancelled image request");
        }
    }

    /// Shared `target -> url` map.
    pub fn targets(&self) -> &Targets {
        &self.shared.targets
    }

    /// Decoded images held in memory.
    pub fn memory(&self) -> &MemoryCache {
        &self.shared.memory
    }

    /// Raw bytes held on disk.
    pub fn files(&self) -> &FileCache {
        &self.shared.files
    }

    /// Memory cache counters.
    pub fn memory_stats(&self) -> CacheStats {
        self.shared.memory.stats()
    }

    /// Number of queued or running fetch tasks.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Drop every decoded image held in memory.
    pub fn clear_memory(&self) {
        self.shared.memory.clear();
    }

    /// Drop both cache tiers.
    pub async fn clear_all(&self) -> Result<usize, LoadError> {
        self.shared.memory.clear();
        self.shared.files.clear().await
    }

    fn queue(&self, url: &str, target: Option<TargetId>) {
        let shared = Arc::clone(&self.shared);
        let url = url.to_string();
        shared.pending.fetch_add(1, Ordering::AcqRel);
        tokio::spawn(async move {
            shared.run(&url, target).await;
            shared.pending.fetch_sub(1, Ordering::AcqRel);
        });
    }
}

impl Shared {
    fn is_reused(&self, target: Option<TargetId>, url: &str) -> bool {
        target.is_some_and(|t| self.targets.is_reused(t, url))
    }

    async fn run(&self, url: &str, target: Option<TargetId>) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        if self.is_reused(target, url) {
            trace!(url = %url, "Target reused before fetch, skipping");
            return;
        }

        let image = match self.memory.get_uncounted(url) {
            Some(image) => image,
            None => match self.load(url).await {
                Ok(image) => {
                    self.memory.put(url, Arc::clone(&image));
                    image
                }
                Err(e) => {
                    self.on_error(url, &e);
                    return;
                }
            },
        };

        let Some(target) = target else {
            return;
        };
        if self.targets.is_reused(target, url) {
            trace!(url = %url, "Target reused after fetch, not delivering");
            return;
        }

        // receiver gone means nobody is displaying anything anymore
        let _ = self.delivery_tx.send(Delivery {
            target,
            url: url.to_string(),
            image,
        });
    }

    fn on_error(&self, url: &str, e: &LoadError) {
        if e.is_memory_limit() {
            warn!(url = %url, "Out of memory decoding image, clearing memory cache");
            self.memory.clear();
        } else {
            warn!(url = %url, error = %e, "Failed to load image");
        }
    }

    /// File cache, then network. Only bytes that decode are written to disk.
    async fn load(&self, url: &str) -> Result<Arc<DynamicImage>, LoadError> {
        if let Some(bytes) = self.files.get_bytes(url).await {
            match self.decode(Bytes::from(bytes)).await {
                Ok(image) => {
                    debug!(url = %url, source = "file", "Image loaded");
                    return Ok(image);
                }
                Err(e) if e.is_memory_limit() => return Err(e),
                Err(e) => {
                    warn!(url = %url, error = %e, "Discarding unreadable cached image");
                    self.files.remove(url).await;
                }
            }
        }

        let bytes = self.fetcher.fetch(url).await?;
        let image = self.decode(bytes.clone()).await?;

        if let Err(e) = self.files.put_bytes(url, &bytes).await {
            warn!(url = %url, error = %e, "Failed to write file cache");
        }

        debug!(url = %url, source = "network", "Image loaded");
        Ok(image)
    }

    async fn decode(&self, bytes: Bytes) -> Result<Arc<DynamicImage>, LoadError> {
        let max_dimension = self.max_dimension;
        let decode_limit = self.decode_limit;
        tokio::task::spawn_blocking(move || decode_image(&bytes, max_dimension, decode_limit))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?
            .map(Arc::new)
    }
}

/// Decode `bytes`, guessing the format from its contents.
fn decode_image(bytes: &[u8], max_dimension: u32, decode_limit: u64) -> Result<DynamicImage, LoadError> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if decode_limit > 0 {
        let mut limits = Limits::default();
        limits.max_alloc = Some(decode_limit);
        reader.limits(limits);
    }
    let image = reader.decode()?;
    Ok(resize_if_needed(image, max_dimension))
}

/// Shrink the image so neither side exceeds `max_dimension`, keeping aspect ratio.
fn resize_if_needed(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());

    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return image;
    }

    let ratio = f64::from(width) / f64::from(height);
    let (new_width, new_height) = if width > height {
        (max_dimension, (f64::from(max_dimension) / ratio) as u32)
    } else {
        ((f64::from(max_dimension) * ratio) as u32, max_dimension)
    };

    image.resize(
        new_width.max(1),
        new_height.max(1),
        image::imageops::FilterType::Triangle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn png(width: u32, height: u32) -> Bytes {
        let mut buf = Vec::new();
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    /// Serves canned bytes. Fetches block until the gate has permits.
    struct FakeFetcher {
        images: HashMap<String, Bytes>,
        gate: Semaphore,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(images: &[(&str, Bytes)], open: bool) -> Arc<Self> {
            Arc::new(Self {
                images: images
                    .iter()
                    .map(|(url, bytes)| ((*url).to_string(), bytes.clone()))
                    .collect(),
                gate: Semaphore::new(if open { Semaphore::MAX_PERMITS } else { 0 }),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate
                .acquire()
                .await
                .map_err(|e| LoadError::Request(e.to_string()))?
                .forget();
            self.images.get(url).cloned().ok_or(LoadError::Status(404))
        }
    }

    /// Holds every fetch open for a while and records peak overlap.
    #[derive(Default)]
    struct SlowFetcher {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowFetcher {
        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ImageFetcher for SlowFetcher {
        async fn fetch(&self, _url: &str) -> Result<Bytes, LoadError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(png(1, 1))
        }
    }

    fn two_at_a_time() -> ImageConfig {
        ImageConfig {
            max_concurrent_fetches: 2,
            ..ImageConfig::default()
        }
    }

    async fn loader_with(
        fetcher: Arc<FakeFetcher>,
        config: ImageConfig,
    ) -> (ImageLoader, Dispatcher, TempDir) {
        loader_around(fetcher, config).await
    }

    async fn loader_around(
        fetcher: Arc<dyn ImageFetcher>,
        config: ImageConfig,
    ) -> (ImageLoader, Dispatcher, TempDir) {
        let temp = TempDir::new().unwrap();
        let files = FileCache::new(temp.path()).await.unwrap();
        let (loader, dispatcher) = ImageLoader::new(&config, files, fetcher);
        (loader, dispatcher, temp)
    }

    async fn settle(loader: &ImageLoader) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while loader.pending_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_network_load_is_delivered_and_cached() {
        let fetcher = FakeFetcher::new(&[("http://img/1.png", png(8, 6))], true);
        let (loader, mut dispatcher, _temp) =
            loader_with(fetcher.clone(), ImageConfig::default()).await;
        let row = TargetId::new(1);

        assert!(matches!(loader.display_image("http://img/1.png", row), Thumbnail::Placeholder));

        let delivery = dispatcher.next().await.unwrap();
        assert_eq!(delivery.target, row);
        assert_eq!(delivery.url, "http://img/1.png");
        assert_eq!((delivery.image.width(), delivery.image.height()), (8, 6));

        settle(&loader).await;
        assert!(loader.memory().contains("http://img/1.png"));
        assert!(loader.files().contains("http://img/1.png").await);

        // second request is a synchronous memory hit
        let shown = loader.display_image("http://img/1.png", TargetId::new(2));
        assert!(shown.image().is_some());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_file_cache_hit_skips_network() {
        let fetcher = FakeFetcher::new(&[], true);
        let (loader, _dispatcher, _temp) =
            loader_with(fetcher.clone(), ImageConfig::default()).await;
        loader.files().put_bytes("http://img/disk.png", &png(3, 3)).await.unwrap();

        let image = loader.load("http://img/disk.png").await.unwrap();
        assert_eq!(image.width(), 3);
        assert_eq!(fetcher.calls(), 0);
        assert!(loader.memory().contains("http://img/disk.png"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_replaced_from_network() {
        let fetcher = FakeFetcher::new(&[("u", png(2, 2))], true);
        let (loader, _dispatcher, _temp) =
            loader_with(fetcher.clone(), ImageConfig::default()).await;
        loader.files().put_bytes("u", b"not an image").await.unwrap();

        let image = loader.load("u").await.unwrap();
        assert_eq!(image.width(), 2);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(loader.files().get_bytes("u").await.unwrap(), png(2, 2).to_vec());
    }

    #[tokio::test]
    async fn test_reused_target_gets_only_latest_image() {
        let fetcher = FakeFetcher::new(&[("a", png(1, 1)), ("b", png(2, 2))], false);
        let (loader, mut dispatcher, _temp) =
            loader_with(fetcher.clone(), ImageConfig::default()).await;
        let row = TargetId::new(9);

        loader.display_image("a", row);
        tokio::time::timeout(Duration::from_secs(5), async {
            while fetcher.calls() == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        // row scrolled away and now shows "b" while "a" is mid-fetch
        loader.display_image("b", row);
        fetcher.gate.add_permits(2);

        let delivery = dispatcher.next().await.unwrap();
        assert_eq!(delivery.url, "b");

        settle(&loader).await;
        assert!(dispatcher.poll().is_empty());
        // the stale load still warms the cache
        assert!(loader.memory().contains("a"));
    }

    #[tokio::test]
    async fn test_reused_before_fetch_never_hits_network() {
        let fetcher = FakeFetcher::new(&[("a", png(1, 1)), ("b", png(1, 1))], true);
        let (loader, mut dispatcher, _temp) =
            loader_with(fetcher.clone(), ImageConfig::default()).await;
        let row = TargetId::new(1);

        // both assignments happen before any task gets to run
        loader.display_image("a", row);
        loader.display_image("b", row);

        assert_eq!(dispatcher.next().await.unwrap().url, "b");
        settle(&loader).await;
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_result() {
        let fetcher = FakeFetcher::new(&[("a", png(1, 1))], false);
        let (loader, mut dispatcher, _temp) =
            loader_with(fetcher.clone(), ImageConfig::default()).await;
        let row = TargetId::new(4);

        loader.display_image("a", row);
        tokio::task::yield_now().await;
        loader.cancel(row);
        fetcher.gate.add_permits(1);

        settle(&loader).await;
        assert!(dispatcher.poll().is_empty());
        assert!(loader.targets().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_dropped() {
        let fetcher = FakeFetcher::new(&[], true);
        let (loader, mut dispatcher, _temp) =
            loader_with(fetcher, ImageConfig::default()).await;

        loader.display_image("missing", TargetId::new(1));
        settle(&loader).await;

        assert!(dispatcher.poll().is_empty());
        assert!(!loader.memory().contains("missing"));
        assert!(matches!(loader.load("missing").await, Err(LoadError::Status(404))));
    }

    #[tokio::test]
    async fn test_decode_limit_clears_memory_cache() {
        let fetcher = FakeFetcher::new(&[("big", png(64, 64))], true);
        let config = ImageConfig {
            decode_limit_bytes: 64,
            ..ImageConfig::default()
        };
        let (loader, _dispatcher, _temp) = loader_with(fetcher, config).await;
        loader.memory().put("warm", Arc::new(DynamicImage::new_rgb8(2, 2)));

        let err = loader.load("big").await.unwrap_err();
        assert!(err.is_memory_limit());
        assert!(loader.memory().is_empty());
        assert!(!loader.files().contains("big").await);
    }

    #[tokio::test]
    async fn test_prefetch_warms_both_tiers() {
        let fetcher = FakeFetcher::new(&[("p", png(4, 4))], true);
        let (loader, mut dispatcher, _temp) =
            loader_with(fetcher.clone(), ImageConfig::default()).await;

        loader.prefetch("p");
        settle(&loader).await;
        loader.prefetch("p");
        settle(&loader).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(loader.memory().contains("p"));
        assert!(loader.files().contains("p").await);
        assert!(dispatcher.poll().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let fetcher = FakeFetcher::new(&[("c", png(1, 1))], true);
        let (loader, _dispatcher, _temp) = loader_with(fetcher, ImageConfig::default()).await;

        loader.load("c").await.unwrap();
        assert_eq!(loader.clear_all().await.unwrap(), 1);
        assert!(loader.memory().is_empty());
        assert!(loader.files().is_empty().await);
    }

    #[tokio::test]
    async fn test_queued_fetches_respect_concurrency_limit() {
        let fetcher = Arc::new(SlowFetcher::default());
        let (loader, mut dispatcher, _temp) =
            loader_around(fetcher.clone(), two_at_a_time()).await;

        for row in 0..10 {
            loader.display_image(&format!("http://img/{row}.png"), TargetId::new(row));
        }

        let mut delivered = 0;
        while delivered < 10 {
            tokio::time::timeout(Duration::from_secs(5), dispatcher.next())
                .await
                .unwrap()
                .unwrap();
            delivered += 1;
        }
        assert_eq!(fetcher.peak(), 2);
    }

    #[tokio::test]
    async fn test_direct_loads_share_concurrency_limit() {
        let fetcher = Arc::new(SlowFetcher::default());
        let (loader, _dispatcher, _temp) =
            loader_around(fetcher.clone(), two_at_a_time()).await;

        let loads = (0..6).map(|n| {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load(&format!("http://img/{n}.png")).await })
        });
        for handle in loads.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(fetcher.peak(), 2);
    }

    #[tokio::test]
    async fn test_dropping_loader_closes_dispatcher_after_in_flight_work() {
        let fetcher = Arc::new(SlowFetcher::default());
        let (loader, mut dispatcher, _temp) =
            loader_around(fetcher, two_at_a_time()).await;

        for row in 0..5 {
            loader.display_image(&format!("http://img/{row}.png"), TargetId::new(row));
        }
        drop(loader);

        let mut delivered = 0;
        tokio::time::timeout(Duration::from_secs(5), async {
            while dispatcher.next().await.is_some() {
                delivered += 1;
            }
        })
        .await
        .unwrap();
        assert_eq!(delivered, 5);
    }

    #[tokio::test]
    async fn test_cold_request_counts_one_miss() {
        let fetcher = FakeFetcher::new(&[("s", png(2, 2))], true);
        let (loader, mut dispatcher, _temp) = loader_with(fetcher, ImageConfig::default()).await;

        loader.display_image("s", TargetId::new(1));
        dispatcher.next().await.unwrap();
        settle(&loader).await;

        let stats = loader.memory_stats();
        assert_eq!((stats.hits, stats.misses), (0, 1));

        loader.display_image("s", TargetId::new(2));
        let stats = loader.memory_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let wide = resize_if_needed(DynamicImage::new_rgb8(1600, 800), 800);
        assert_eq!((wide.width(), wide.height()), (800, 400));

        let tall = resize_if_needed(DynamicImage::new_rgb8(300, 1200), 600);
        assert_eq!((tall.width(), tall.height()), (150, 600));

        let small = resize_if_needed(DynamicImage::new_rgb8(10, 10), 800);
        assert_eq!(small.width(), 10);

        let untouched = resize_if_needed(DynamicImage::new_rgb8(2000, 10), 0);
        assert_eq!(untouched.width(), 2000);
    }
}
