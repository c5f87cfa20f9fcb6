//! Common paths for hotelroom data storage
//!
//! - ~/.config/hotelroom/config.toml - User configuration
//! - <platform cache dir>/hotelroom/images/ - Thumbnail file cache

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "hotelroom";

/// Get the hotelroom config directory (~/.config/hotelroom/)
pub fn app_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let app_dir = home.join(".config").join(APP_DIR);
    fs::create_dir_all(&app_dir).context("Failed to create hotelroom directory")?;
    Ok(app_dir)
}

/// Get the config file path (~/.config/hotelroom/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("config.toml"))
}

/// Get the image cache directory
///
/// Falls back to the system temp dir when the platform has no cache dir.
pub fn image_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    let dir = base.join(APP_DIR).join("images");
    fs::create_dir_all(&dir).context("Failed to create image cache directory")?;
    Ok(dir)
}
