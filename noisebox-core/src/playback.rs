//! Playback sessions over a pluggable audio backend.
//!
//! A [`PlaybackSession`] owns exactly one loaded sound. Unloading consumes
//! the session, so a released handle cannot be used through it again; the
//! backend still rejects stale handles with [`Error::InvalidHandle`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::ColorId;
use crate::error::{Error, Result};

/// Opaque identifier of a sound loaded into an [`AudioBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle(u64);

impl SoundHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Called when a non-looping sound reaches its end.
pub type FinishCallback = Arc<dyn Fn(SoundHandle) + Send + Sync>;

/// How a sound should be played once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub looping: bool,
    /// Volume, 0-100.
    pub volume: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            looping: true,
            volume: 100,
        }
    }
}

/// Platform audio. Every method except `load` fails with
/// [`Error::InvalidHandle`] for a handle that was never loaded or was unloaded.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Decodes a local file. Fails with [`Error::Load`] if it is unreadable.
    async fn load(&self, path: &Path, options: LoadOptions, on_finish: FinishCallback) -> Result<SoundHandle>;

    /// Starts or resumes playback.
    async fn play(&self, handle: SoundHandle) -> Result<()>;

    /// Pauses, keeping the position.
    async fn pause(&self, handle: SoundHandle) -> Result<()>;

    /// Stops and rewinds; the sound stays loaded.
    async fn stop(&self, handle: SoundHandle) -> Result<()>;

    /// Releases the sound.
    async fn unload(&self, handle: SoundHandle) -> Result<()>;

    /// Silences or restores output without affecting playback position.
    async fn set_muted(&self, handle: SoundHandle, muted: bool) -> Result<()>;

    /// Number of sounds currently loaded.
    fn loaded_count(&self) -> usize;
}

/// The one live sound, as the controller sees it.
pub struct PlaybackSession {
    backend: Arc<dyn AudioBackend>,
    handle: SoundHandle,
    color: ColorId,
    options: LoadOptions,
    playing: bool,
    muted: bool,
}

impl PlaybackSession {
    /// Loads `path` for `color`. The sound starts stopped.
    pub async fn load(
        backend: Arc<dyn AudioBackend>,
        color: ColorId,
        path: &Path,
        options: LoadOptions,
        on_finish: FinishCallback,
    ) -> Result<Self> {
        let handle = backend.load(path, options, on_finish).await?;
        tracing::info!("Loaded {} from {} as {}", color, path.display(), handle);

        Ok(Self {
            backend,
            handle,
            color,
            options,
            playing: false,
            muted: false,
        })
    }

    pub async fn play(&mut self) -> Result<()> {
        self.backend.play(self.handle).await?;
        self.playing = true;
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.backend.pause(self.handle).await?;
        self.playing = false;
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.backend.stop(self.handle).await?;
        self.playing = false;
        Ok(())
    }

    pub async fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.backend.set_muted(self.handle, muted).await?;
        self.muted = muted;
        Ok(())
    }

    /// Stops and releases the sound.
    ///
    /// The handle is released even if stopping fails; the first error is returned.
    pub async fn unload(mut self) -> Result<()> {
        let stopped = if self.playing { self.stop().await } else { Ok(()) };
        let unloaded = self.backend.unload(self.handle).await;
        tracing::info!("Unloaded {} ({})", self.color, self.handle);
        stopped.and(unloaded)
    }

    pub fn handle(&self) -> SoundHandle {
        self.handle
    }

    pub fn color(&self) -> &ColorId {
        &self.color
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_looping(&self) -> bool {
        self.options.looping
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("handle", &self.handle)
            .field("color", &self.color)
            .field("playing", &self.playing)
            .field("muted", &self.muted)
            .finish()
    }
}

/// Convenience for backends: the error for an unknown handle.
pub fn invalid_handle(handle: SoundHandle) -> Error {
    Error::InvalidHandle(handle.id())
}
