//! Error types for noisebox-core.

use thiserror::Error;

/// Main error type for the noisebox-core library.
#[derive(Error, Debug)]
pub enum Error {
    // Config errors
    #[error("Failed to load config '{0}': {1}")]
    ConfigLoad(String, String),

    #[error("Failed to parse config '{0}': {1}")]
    ConfigParse(String, String),

    #[error("Config validation error in '{0}': {1}")]
    ConfigValidation(String, String),

    #[error("Unknown color: {0}")]
    UnknownColor(String),

    // Cache errors
    #[error("Failed to download {0}: {1}")]
    Download(String, String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Failed to acquire cache lock")]
    CacheLock,

    // Playback errors
    #[error("Failed to load sound {0}: {1}")]
    Load(String, String),

    #[error("Sound handle {0} is no longer loaded")]
    InvalidHandle(u64),

    #[error("No audio output device available")]
    NoAudioDevice,

    #[error("Playback failed: {0}")]
    Playback(String),

    // Generic errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
