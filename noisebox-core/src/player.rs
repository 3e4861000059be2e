//! Host-facing facade: a catalog plus the session controller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;

use crate::asset_cache::{AssetCache, Downloader, HttpDownloader};
use crate::catalog::Catalog;
use crate::config::PlayerConfig;
use crate::controller::SessionController;
use crate::engines::KiraBackend;
use crate::error::{Error, Result};
use crate::playback::{AudioBackend, LoadOptions};
use crate::state::{MuteOutcome, PlayerState, SelectOutcome};

/// The player a host screen talks to.
///
/// Selection is by color id; ids not in the catalog are rejected before the
/// controller sees them.
#[derive(Clone, Debug)]
pub struct Player {
    catalog: Catalog,
    controller: SessionController,
}

impl Player {
    /// Builds a player over the given backend and downloader.
    ///
    /// `default_cache_dir` is used unless the config names its own.
    pub fn new<P: AsRef<Path>>(
        config: &PlayerConfig,
        default_cache_dir: P,
        backend: Arc<dyn AudioBackend>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        let cache_dir: PathBuf = config
            .cache_dir
            .clone()
            .unwrap_or_else(|| default_cache_dir.as_ref().to_path_buf());
        tracing::info!(
            "Player using cache dir {} ({} colors)",
            cache_dir.display(),
            config.colors.len()
        );

        let cache = Arc::new(AssetCache::new(cache_dir, downloader));
        let options = LoadOptions {
            looping: config.looping,
            volume: config.volume,
        };

        Self {
            catalog: Catalog::from_config(config),
            controller: SessionController::new(backend, cache, options),
        }
    }

    /// Builds a player that downloads over HTTP and plays through kira.
    pub fn with_defaults<P: AsRef<Path>>(config: &PlayerConfig, default_cache_dir: P) -> Result<Self> {
        let downloader = Arc::new(HttpDownloader::new()?);
        Ok(Self::new(
            config,
            default_cache_dir,
            Arc::new(KiraBackend::new()),
            downloader,
        ))
    }

    /// Selects a color by id.
    pub async fn select(&self, color_id: &str) -> Result<SelectOutcome> {
        let selection = self
            .catalog
            .selection(color_id)
            .ok_or_else(|| Error::UnknownColor(color_id.to_string()))?;
        Ok(self.controller.select_color(selection).await)
    }

    pub async fn toggle_mute(&self) -> MuteOutcome {
        self.controller.toggle_mute().await
    }

    pub async fn pause(&self) -> bool {
        self.controller.pause().await
    }

    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
    }

    /// Deletes the cached files of every catalog color, leaving anything
    /// else in the cache directory alone. Returns how many were removed.
    pub fn clear_cache(&self) -> Result<usize> {
        let urls = self.catalog.colors().iter().map(|c| c.url.as_str());
        self.controller.cache().clear_cache(urls)
    }

    pub fn state(&self) -> PlayerState {
        self.controller.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.controller.subscribe()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }
}
