//! # hotelroom
//!
//! Data layer for a hotel room reservation client.
//!
//! ## Overview
//!
//! hotelroom maps the reservation server's JSON responses into typed room and
//! booking records, and loads room thumbnails for list and grid views through a
//! two-tier (memory + disk) cache that copes with recycled rows.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        UI loop                              │
//! │   display_image(url, row)  ◄──  Dispatcher::poll/next       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │  Memory cache   │ │   File cache    │ │    Fetcher      │
//! │                 │ │                 │ │                 │
//! │ • Byte budget   │ │ • SHA-256 names │ │ • reqwest       │
//! │ • LRU eviction  │ │ • Raw bytes     │ │ • Worker tasks  │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//!
//! ┌─────────────────┐ ┌─────────────────┐
//! │     Parser      │ │     Models      │
//! │                 │ │                 │
//! │ • rooms         │ │ • Room          │
//! │ • bookings      │ │ • Reservation   │
//! │ • photos        │ │                 │
//! └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`images`] - Thumbnail loader, caches and dispatcher
//! - [`models`] - Data models (Room, Reservation)
//! - [`parser`] - JSON response parser
//! - [`paths`] - Config and cache locations
//!
//! ## Example
//!
//! ```no_run
//! use hotelroom::images::{ImageLoader, TargetId, Thumbnail};
//!
//! # async fn demo(rooms_json: &str) -> anyhow::Result<()> {
//! let config = hotelroom::Config::load()?;
//! let (loader, mut dispatcher) = ImageLoader::from_config(&config.images).await?;
//!
//! for (row, room) in hotelroom::parser::parse_rooms(rooms_json)?.iter().enumerate() {
//!     if let Thumbnail::Ready(image) = loader.display_image(&room.url, TargetId::new(row as u64)) {
//!         println!("row {row}: {}x{}", image.width(), image.height());
//!     }
//! }
//!
//! while let Some(delivery) = dispatcher.next().await {
//!     println!("{} ready for {}", delivery.url, delivery.target);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::needless_pass_by_value)]

pub mod config;
pub mod images;
pub mod models;
pub mod parser;
pub mod paths;

// Re-export main types for convenience
pub use config::{Config, ImageConfig};
pub use images::{Delivery, Dispatcher, ImageLoader, LoadError, TargetId, Thumbnail};
pub use models::{Reservation, Room};
pub use parser::ParseError;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
