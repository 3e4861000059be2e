//! Configuration types for the player.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_volume() -> u8 {
    100
}

fn default_looping() -> bool {
    true
}

/// Complete player configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Where downloaded assets are kept. Hosts usually pass their
    /// app-private directory instead of setting this.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Playback volume, 0-100.
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// Ambient tracks loop indefinitely unless this is turned off.
    #[serde(default = "default_looping")]
    pub looping: bool,
    /// Selectable colors in display order.
    #[serde(default)]
    pub colors: Vec<ColorAsset>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            volume: default_volume(),
            looping: default_looping(),
            colors: Vec::new(),
        }
    }
}

/// A noise color bound to one remote audio asset.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ColorAsset {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}
