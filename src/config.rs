//! Configuration module for hotelroom

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::images::{DEFAULT_MEMORY_BUDGET, DEFAULT_TIMEOUT_SECS};
use crate::paths;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Thumbnail loading and caching
    #[serde(default)]
    pub images: ImageConfig,
}

/// Image loader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Byte budget for decoded images kept in memory
    #[serde(default = "default_memory_budget")]
    pub memory_budget_bytes: usize,

    /// Directory for the on-disk cache (defaults to the platform cache dir)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of images fetched or decoded at once
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Downscale decoded images so neither side exceeds this (0 = keep original size)
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// Allocation ceiling for a single decode in bytes (0 = decoder default)
    #[serde(default)]
    pub decode_limit_bytes: u64,
}

fn default_memory_budget() -> usize {
    DEFAULT_MEMORY_BUDGET
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_dimension() -> u32 {
    800
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: default_memory_budget(),
            cache_dir: None,
            max_concurrent_fetches: default_max_concurrent_fetches(),
            timeout_secs: default_timeout(),
            max_dimension: default_max_dimension(),
            decode_limit_bytes: 0,
        }
    }
}

impl ImageConfig {
    /// Resolved on-disk cache directory
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::image_cache_dir(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        paths::config_path()
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}
