//! Best-effort on-disk cache of raw image bytes.
//!
//! Files are named by the SHA-256 of the source URL so any URL maps to a safe,
//! fixed-length file name. There is no eviction; [`FileCache::clear`] is the
//! only way entries leave the directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, trace, warn};

use super::LoadError;

const EXTENSION: &str = "img";

/// Directory-backed store of raw image bytes keyed by URL.
pub struct FileCache {
    dir: PathBuf,
    write_seq: AtomicU64,
}

impl FileCache {
    /// Open a cache rooted at `dir`, creating it if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Opened file cache");
        Ok(Self {
            dir,
            write_seq: AtomicU64::new(0),
        })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds (or would hold) the bytes for `url`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", cache_key(url)))
    }

    /// Read cached bytes. Any read failure is a miss.
    pub async fn get_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.path_for(url);
        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(url = %url, "File cache hit");
                Some(bytes)
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(url = %url, error = %e, "Failed to read cached image");
                }
                trace!(url = %url, "File cache miss");
                None
            }
        }
    }

    /// Store bytes for `url`.
    ///
    /// Written to a temporary file first and renamed into place, so readers
    /// never see a partial image.
    pub async fn put_bytes(&self, url: &str, bytes: &[u8]) -> Result<(), LoadError> {
        let path = self.path_for(url);
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp{}-{seq}", std::process::id()));

        if let Err(e) = fs::write(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(url = %url, size = bytes.len(), "Stored image in file cache");
        Ok(())
    }

    /// Whether bytes are cached for `url`.
    pub async fn contains(&self, url: &str) -> bool {
        fs::try_exists(self.path_for(url)).await.unwrap_or(false)
    }

    /// Delete the entry for `url`, if any.
    pub async fn remove(&self, url: &str) {
        if let Err(e) = fs::remove_file(self.path_for(url)).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(url = %url, error = %e, "Failed to remove cached image");
        }
    }

    /// Delete every cached file. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, LoadError> {
        let mut removed = 0;
        for path in self.entries().await? {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cache file"),
            }
        }
        debug!(removed, "Cleared file cache");
        Ok(removed)
    }

    /// Number of cached files.
    pub async fn len(&self) -> usize {
        self.entries().await.map_or(0, |entries| entries.len())
    }

    /// Whether the cache directory holds no images.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Total bytes on disk.
    pub async fn size_bytes(&self) -> u64 {
        let Ok(entries) = self.entries().await else {
            return 0;
        };
        let mut total = 0;
        for path in entries {
            if let Ok(meta) = fs::metadata(&path).await {
                total += meta.len();
            }
        }
        total
    }

    async fn entries(&self) -> Result<Vec<PathBuf>, LoadError> {
        let mut dir = fs::read_dir(&self.dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

/// Stable file-name key for a URL (lowercase hex SHA-256).
pub fn cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}
