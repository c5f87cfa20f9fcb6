//! Tracks which URL each reusable UI element currently wants.
//!
//! List and grid rows get recycled while their images are still loading. Every
//! request records `target -> url` here (last write wins), and a finished load
//! is only applied if the target still wants the URL it was started for.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque identifier for a reusable UI element (a row, a cell, an image slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Wrap a caller-chosen identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TargetId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Shared `target -> url` map.
#[derive(Debug, Clone, Default)]
pub struct Targets {
    inner: Arc<Mutex<HashMap<TargetId, String>>>,
}

impl Targets {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TargetId, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point `target` at `url`, replacing whatever it wanted before.
    pub fn assign(&self, target: TargetId, url: &str) {
        self.lock().insert(target, url.to_string());
    }

    /// URL the target currently wants.
    pub fn current(&self, target: TargetId) -> Option<String> {
        self.lock().get(&target).cloned()
    }

    /// Forget the target. Returns the URL it wanted.
    pub fn release(&self, target: TargetId) -> Option<String> {
        self.lock().remove(&target)
    }

    /// True when `target` no longer wants `url` (released or reassigned).
    pub fn is_reused(&self, target: TargetId, url: &str) -> bool {
        self.lock().get(&target).is_none_or(|current| current != url)
    }

    /// Number of tracked targets.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no targets are tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget every target.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
