//! Shared kira audio output.
//!
//! Every sound plays through one `AudioManager` (one cpal stream). It is
//! created lazily on first playback so that loading and decoding work on
//! machines without an output device.

use std::sync::{Mutex, OnceLock};

use kira::{AudioManager, AudioManagerSettings, Decibels, DefaultBackend};

static AUDIO_MANAGER: OnceLock<Option<Mutex<AudioManager<DefaultBackend>>>> = OnceLock::new();

fn audio_manager() -> Option<&'static Mutex<AudioManager<DefaultBackend>>> {
    AUDIO_MANAGER
        .get_or_init(|| match AudioManager::<DefaultBackend>::new(AudioManagerSettings::default()) {
            Ok(manager) => {
                tracing::info!("Audio output initialized");
                Some(Mutex::new(manager))
            }
            Err(e) => {
                tracing::error!("Failed to initialize audio output: {}", e);
                None
            }
        })
        .as_ref()
}

/// Runs `f` with the shared `AudioManager`, or returns `None` if no audio
/// device is available.
pub fn with_audio_manager<T>(f: impl FnOnce(&mut AudioManager<DefaultBackend>) -> T) -> Option<T> {
    let manager = audio_manager()?;
    let mut guard = manager.lock().ok()?;
    Some(f(&mut guard))
}

/// Returns whether an audio output device could be opened.
pub fn is_audio_available() -> bool {
    audio_manager().is_some()
}

/// Maps a 0-100 volume to decibels. 0 is silence.
pub fn volume_to_db(volume: u8) -> Decibels {
    if volume == 0 {
        return Decibels::SILENCE;
    }
    let amplitude = f32::from(volume.min(100)) / 100.0;
    Decibels(20.0 * amplitude.log10())
}
