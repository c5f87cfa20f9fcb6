//! Hands finished images back to the single UI consumer.
//!
//! Workers post a [`Delivery`] per finished load. The owner of the
//! [`Dispatcher`] (the UI loop) drains them and applies each image to its
//! target. Deliveries whose target has moved on to another URL are dropped
//! here, at the last moment before they would be shown.

use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::mpsc;
use tracing::trace;

use super::targets::{TargetId, Targets};

/// A loaded image addressed to a target.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Element the image was requested for.
    pub target: TargetId,
    /// Source URL.
    pub url: String,
    /// Decoded image.
    pub image: Arc<DynamicImage>,
}

/// Receiving end of finished loads.
pub struct Dispatcher {
    rx: mpsc::UnboundedReceiver<Delivery>,
    targets: Targets,
}

impl Dispatcher {
    pub(crate) const fn new(rx: mpsc::UnboundedReceiver<Delivery>, targets: Targets) -> Self {
        Self { rx, targets }
    }

    fn is_fresh(&self, delivery: &Delivery) -> bool {
        if self.targets.is_reused(delivery.target, &delivery.url) {
            trace!(target_id = %delivery.target, url = %delivery.url, "Dropping stale delivery");
            false
        } else {
            true
        }
    }

    /// Drain every pending delivery without blocking, skipping stale ones.
    pub fn poll(&mut self) -> Vec<Delivery> {
        let mut fresh = Vec::new();
        while let Ok(delivery) = self.rx.try_recv() {
            if self.is_fresh(&delivery) {
                fresh.push(delivery);
            }
        }
        fresh
    }

    /// Wait for the next fresh delivery.
    ///
    /// Returns `None` once the loader and all of its in-flight work are gone.
    pub async fn next(&mut self) -> Option<Delivery> {
        while let Some(delivery) = self.rx.recv().await {
            if self.is_fresh(&delivery) {
                return Some(delivery);
            }
        }
        None
    }

    /// Apply every pending fresh delivery with `apply`. Returns how many were applied.
    pub fn dispatch<F>(&mut self, mut apply: F) -> usize
    where
        F: FnMut(Delivery),
    {
        let deliveries = self.poll();
        let count = deliveries.len();
        for delivery in deliveries {
            apply(delivery);
        }
        count
    }
}
