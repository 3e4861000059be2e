//! YAML configuration loader.

use std::fs;
use std::path::Path;

use crate::config::types::PlayerConfig;
use crate::config::validator::ConfigValidator;
use crate::error::{Error, Result};

/// Loads and validates player configuration.
pub struct ConfigLoader {
    validator: ConfigValidator,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            validator: ConfigValidator::new(),
        }
    }

    /// Loads a config file from disk.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<PlayerConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(path.display().to_string(), e.to_string()))?;
        self.parse(&path.display().to_string(), &content)
    }

    /// Loads a config from an in-memory YAML string (e.g. bundled with the app).
    pub fn load_str(&self, content: &str) -> Result<PlayerConfig> {
        self.parse("<inline>", content)
    }

    fn parse(&self, source: &str, content: &str) -> Result<PlayerConfig> {
        let config: PlayerConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(source.to_string(), e.to_string()))?;

        self.validator.validate(&config)?;

        tracing::info!("Loaded player config from {} ({} colors)", source, config.colors.len());
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
