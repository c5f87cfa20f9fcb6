//! Image loading errors.

use thiserror::Error;

/// Why an image could not be produced.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Request(String),
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),
    /// The bytes are not a decodable image, or decoding hit a limit.
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    /// File cache I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The blocking decode task was cancelled or panicked.
    #[error("decode task failed: {0}")]
    Task(String),
}

impl LoadError {
    /// True when decoding ran out of its memory allowance.
    pub fn is_memory_limit(&self) -> bool {
        matches!(self, Self::Decode(image::ImageError::Limits(_)))
    }
}
