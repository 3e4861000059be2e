//! Read-only color catalog: color id -> remote asset.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ColorAsset, PlayerConfig};

/// Identifier of a noise color (e.g. `white`, `brown`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorId(String);

impl ColorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A color selection event: which color, and where its audio lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorSelection {
    pub color: ColorId,
    pub url: String,
}

impl ColorSelection {
    pub fn new(color: impl Into<ColorId>, url: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            url: url.into(),
        }
    }
}

/// The set of selectable colors, in display order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    colors: Vec<ColorAsset>,
}

impl Catalog {
    pub fn new(colors: Vec<ColorAsset>) -> Self {
        Self { colors }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.colors.clone())
    }

    /// Looks up the asset for a color id.
    pub fn get(&self, id: &str) -> Option<&ColorAsset> {
        self.colors.iter().find(|c| c.id == id)
    }

    /// Builds the selection event for a color id.
    pub fn selection(&self, id: &str) -> Option<ColorSelection> {
        self.get(id)
            .map(|asset| ColorSelection::new(asset.id.as_str(), asset.url.as_str()))
    }

    pub fn colors(&self) -> &[ColorAsset] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
