//! Configuration validation.

use std::collections::HashMap;

use regex::Regex;

use crate::asset_cache::cache_file_name;
use crate::config::types::{ColorAsset, PlayerConfig};
use crate::error::{Error, Result};
use crate::state::MUTED_SENTINEL;

/// Validator for player configurations.
pub struct ConfigValidator {
    url_pattern: Regex,
}

impl ConfigValidator {
    /// Creates a new validator.
    pub fn new() -> Self {
        Self {
            // scheme, host, and at least one path segment not ending in '/'
            url_pattern: Regex::new(r"^https?://[^/\s]+/\S*[^/\s]$").expect("static regex"),
        }
    }

    /// Validates a player configuration.
    pub fn validate(&self, config: &PlayerConfig) -> Result<()> {
        if config.volume > 100 {
            return Err(Error::ConfigValidation(
                "volume".to_string(),
                format!("Volume must be 0-100, got {}", config.volume),
            ));
        }

        if config.colors.is_empty() {
            return Err(Error::ConfigValidation(
                "colors".to_string(),
                "At least one color is required".to_string(),
            ));
        }

        let mut ids: HashMap<&str, usize> = HashMap::new();
        let mut file_names: HashMap<String, &str> = HashMap::new();

        for (index, color) in config.colors.iter().enumerate() {
            self.validate_id(index, color)?;
            if ids.insert(color.id.as_str(), index).is_some() {
                return Err(Error::ConfigValidation(
                    format!("colors[{}].id", index),
                    format!("Duplicate color id '{}'", color.id),
                ));
            }

            let file_name = self.validate_url(color)?;
            // The file name is the whole cache index, so two colors must not share one.
            if let Some(other) = file_names.insert(file_name.clone(), color.id.as_str()) {
                return Err(Error::ConfigValidation(
                    format!("colors.{}.url", color.id),
                    format!("Cache file '{}' is already used by '{}'", file_name, other),
                ));
            }
        }

        Ok(())
    }

    fn validate_id(&self, index: usize, color: &ColorAsset) -> Result<()> {
        if color.id.trim().is_empty() {
            return Err(Error::ConfigValidation(
                format!("colors[{}].id", index),
                "Color id cannot be empty".to_string(),
            ));
        }
        if color.id == MUTED_SENTINEL {
            return Err(Error::ConfigValidation(
                format!("colors[{}].id", index),
                format!("'{}' is reserved", MUTED_SENTINEL),
            ));
        }
        Ok(())
    }

    fn validate_url(&self, color: &ColorAsset) -> Result<String> {
        if !self.url_pattern.is_match(&color.url) {
            return Err(Error::ConfigValidation(
                format!("colors.{}.url", color.id),
                format!("Not an http(s) asset URL: {}", color.url),
            ));
        }
        cache_file_name(&color.url).ok_or_else(|| {
            Error::ConfigValidation(
                format!("colors.{}.url", color.id),
                format!("Cannot derive a file name from {}", color.url),
            )
        })
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
