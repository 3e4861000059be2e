//! kira implementation of [`AudioBackend`].
//!
//! Loading only decodes the file into a `StaticSoundData`; the sound is handed
//! to the shared `AudioManager` on first play. Stopping drops the kira handle
//! so the next play starts from the beginning.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle};
use kira::sound::PlaybackState;
use kira::{Decibels, Tween};

use crate::engines::audio_output::{volume_to_db, with_audio_manager};
use crate::error::{Error, Result};
use crate::playback::{invalid_handle, AudioBackend, FinishCallback, LoadOptions, SoundHandle};

/// How often non-looping sounds are checked for natural completion.
const FINISH_POLL_INTERVAL: Duration = Duration::from_millis(250);

type SoundMap = Arc<Mutex<HashMap<SoundHandle, LoadedSound>>>;

/// A decoded sound and, while it is playing or paused, its kira handle.
struct LoadedSound {
    data: StaticSoundData,
    handle: Option<StaticSoundHandle>,
    options: LoadOptions,
    muted: bool,
    on_finish: FinishCallback,
}

impl LoadedSound {
    fn output_volume(&self) -> Decibels {
        if self.muted {
            Decibels::SILENCE
        } else {
            volume_to_db(self.options.volume)
        }
    }
}

/// Audio backend playing through the shared kira `AudioManager`.
pub struct KiraBackend {
    sounds: SoundMap,
    next_id: AtomicU64,
}

impl KiraBackend {
    pub fn new() -> Self {
        Self {
            sounds: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SoundHandle, LoadedSound>>> {
        self.sounds
            .lock()
            .map_err(|_| Error::Playback("Failed to acquire sound lock".to_string()))
    }
}

impl Default for KiraBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioBackend for KiraBackend {
    async fn load(&self, path: &Path, options: LoadOptions, on_finish: FinishCallback) -> Result<SoundHandle> {
        let owned = path.to_path_buf();
        let decoded = tokio::task::spawn_blocking(move || StaticSoundData::from_file(owned))
            .await
            .map_err(|e| Error::Load(path.display().to_string(), e.to_string()))?
            .map_err(|e| Error::Load(path.display().to_string(), e.to_string()))?;

        let data = if options.looping {
            decoded.loop_region(..)
        } else {
            decoded
        };

        let handle = SoundHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock()?.insert(
            handle,
            LoadedSound {
                data,
                handle: None,
                options,
                muted: false,
                on_finish,
            },
        );

        tracing::debug!("Decoded {} as {}", path.display(), handle);
        Ok(handle)
    }

    async fn play(&self, handle: SoundHandle) -> Result<()> {
        let started_fresh = {
            let mut sounds = self.lock()?;
            let sound = sounds.get_mut(&handle).ok_or_else(|| invalid_handle(handle))?;

            if let Some(active) = sound.handle.as_mut() {
                active.resume(Tween::default());
                false
            } else {
                let data = sound.data.volume(sound.output_volume());
                let active = with_audio_manager(|mgr| mgr.play(data))
                    .ok_or(Error::NoAudioDevice)?
                    .map_err(|e| Error::Playback(format!("{:?}", e)))?;
                sound.handle = Some(active);
                true
            }
        };

        if started_fresh {
            let looping = self.lock()?.get(&handle).map_or(true, |s| s.options.looping);
            if !looping {
                spawn_finish_monitor(Arc::clone(&self.sounds), handle);
            }
        }
        Ok(())
    }

    async fn pause(&self, handle: SoundHandle) -> Result<()> {
        let mut sounds = self.lock()?;
        let sound = sounds.get_mut(&handle).ok_or_else(|| invalid_handle(handle))?;
        if let Some(active) = sound.handle.as_mut() {
            active.pause(Tween::default());
        }
        Ok(())
    }

    async fn stop(&self, handle: SoundHandle) -> Result<()> {
        let mut sounds = self.lock()?;
        let sound = sounds.get_mut(&handle).ok_or_else(|| invalid_handle(handle))?;
        if let Some(mut active) = sound.handle.take() {
            active.stop(Tween::default());
        }
        Ok(())
    }

    async fn unload(&self, handle: SoundHandle) -> Result<()> {
        let mut sounds = self.lock()?;
        let mut sound = sounds.remove(&handle).ok_or_else(|| invalid_handle(handle))?;
        if let Some(mut active) = sound.handle.take() {
            active.stop(Tween::default());
        }
        Ok(())
    }

    async fn set_muted(&self, handle: SoundHandle, muted: bool) -> Result<()> {
        let mut sounds = self.lock()?;
        let sound = sounds.get_mut(&handle).ok_or_else(|| invalid_handle(handle))?;
        sound.muted = muted;
        let volume = sound.output_volume();
        if let Some(active) = sound.handle.as_mut() {
            active.set_volume(volume, Tween::default());
        }
        Ok(())
    }

    fn loaded_count(&self) -> usize {
        self.sounds.lock().map_or(0, |sounds| sounds.len())
    }
}

/// Polls a non-looping sound and fires its finish callback once it stops on
/// its own. Exits quietly if the sound is stopped or unloaded first.
fn spawn_finish_monitor(sounds: SoundMap, id: SoundHandle) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(FINISH_POLL_INTERVAL).await;

            let finished = {
                let mut map = match sounds.lock() {
                    Ok(map) => map,
                    Err(_) => return,
                };
                let Some(sound) = map.get_mut(&id) else {
                    return;
                };
                let still_running = match sound.handle.as_ref() {
                    Some(active) => !matches!(active.state(), PlaybackState::Stopped),
                    None => return,
                };
                if still_running {
                    None
                } else {
                    sound.handle = None;
                    Some(Arc::clone(&sound.on_finish))
                }
            };

            if let Some(on_finish) = finished {
                tracing::debug!("Sound {} finished", id);
                on_finish(id);
                return;
            }
        }
    });
}

impl Drop for KiraBackend {
    fn drop(&mut self) {
        if let Ok(mut sounds) = self.sounds.lock() {
            for (_, mut sound) in sounds.drain() {
                if let Some(mut active) = sound.handle.take() {
                    active.stop(Tween::default());
                }
            }
        }
    }
}
