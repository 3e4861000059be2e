//! Noisebox Core - playback session kernel for the Noisebox ambient noise player.
//!
//! This library provides:
//! - Configuration loading and validation for the color catalog
//! - An asset cache that downloads each remote track once and reuses it
//! - A session controller that keeps exactly one track live while colors
//!   are selected, switched, muted and stopped
//! - A kira audio backend and an FFI layer for Swift/Kotlin hosts
//!
//! # Example
//!
//! ```rust,no_run
//! use noisebox_core::config::ConfigLoader;
//! use noisebox_core::player::Player;
//!
//! # async fn run() -> noisebox_core::Result<()> {
//! let config = ConfigLoader::new().load("player.yaml")?;
//! let player = Player::with_defaults(&config, "/tmp/noisebox-cache")?;
//!
//! player.select("white").await?; // downloads on first use, then plays
//! player.toggle_mute().await;
//! player.select("brown").await?; // switches tracks
//! # Ok(())
//! # }
//! ```

pub mod asset_cache;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod engines;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod mute;
pub mod playback;
pub mod player;
pub mod state;

pub use error::{Error, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::asset_cache::{AssetCache, DownloadObserver, DownloadStatus, Downloader, HttpDownloader};
    pub use crate::catalog::{Catalog, ColorId, ColorSelection};
    pub use crate::config::{ColorAsset, ConfigLoader, PlayerConfig};
    pub use crate::controller::SessionController;
    pub use crate::engines::KiraBackend;
    pub use crate::error::{Error, Result};
    pub use crate::playback::{AudioBackend, LoadOptions, PlaybackSession, SoundHandle};
    pub use crate::player::Player;
    pub use crate::state::{MuteOutcome, PlayerState, SelectOutcome, SessionPhase, MUTED_SENTINEL};
}
