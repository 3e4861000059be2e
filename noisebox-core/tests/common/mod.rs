//! Shared fakes for controller and player tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use noisebox_core::asset_cache::{AssetCache, DownloadReport, Downloader};
use noisebox_core::catalog::ColorSelection;
use noisebox_core::controller::SessionController;
use noisebox_core::playback::{AudioBackend, FinishCallback, LoadOptions, SoundHandle};
use noisebox_core::{Error, Result};
use tempfile::TempDir;
use tokio::sync::Notify;

pub const WHITE_URL: &str = "https://cdn.example.com/noise/white.mp3";
pub const BROWN_URL: &str = "https://cdn.example.com/noise/brown.mp3";
pub const PINK_URL: &str = "https://cdn.example.com/noise/pink.mp3";

/// Body that [`FakeBackend`] refuses to decode.
pub const CORRUPT_BODY: &[u8] = b"garbage";

pub fn white() -> ColorSelection {
    ColorSelection::new("white", WHITE_URL)
}

pub fn brown() -> ColorSelection {
    ColorSelection::new("brown", BROWN_URL)
}

pub fn pink() -> ColorSelection {
    ColorSelection::new("pink", PINK_URL)
}

// ============================================================================
// Fake Downloader
// ============================================================================

#[derive(Default)]
pub struct FakeDownloader {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    attempts: Mutex<HashMap<String, usize>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for `url` instead of the default audio bytes.
    pub fn set_body(&self, url: &str, body: &[u8]) {
        self.bodies.lock().unwrap().insert(url.to_string(), body.to_vec());
    }

    /// Makes every download of `url` fail.
    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    /// Holds downloads of `url` until the returned gate is notified.
    pub fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn attempts(&self, url: &str) -> usize {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadReport> {
        *self.attempts.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let gate = self.gates.lock().unwrap().get(url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.lock().unwrap().contains(url) {
            return Err(Error::Download(url.to_string(), "Connection reset".to_string()));
        }

        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| format!("RIFF audio for {}", url).into_bytes());
        tokio::fs::write(dest, &body).await?;

        Ok(DownloadReport {
            bytes: body.len() as u64,
            expected: Some(body.len() as u64),
        })
    }
}

// ============================================================================
// Fake AudioBackend
// ============================================================================

struct FakeSound {
    file_name: String,
    playing: bool,
    muted: bool,
    on_finish: FinishCallback,
}

#[derive(Default)]
struct BackendState {
    sounds: HashMap<SoundHandle, FakeSound>,
    loads: usize,
    unloads: usize,
    peak_playing: usize,
    peak_loaded: usize,
}

impl BackendState {
    fn playing(&self) -> usize {
        self.sounds.values().filter(|s| s.playing).count()
    }
}

/// In-memory backend that records what the controller asks of it.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
    next_id: AtomicU64,
    load_gates: Mutex<HashMap<String, Arc<Notify>>>,
    loads_started: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds loads of the cached file named `file_name` until notified.
    pub fn gate_load(&self, file_name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.load_gates
            .lock()
            .unwrap()
            .insert(file_name.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn loads_started(&self, file_name: &str) -> usize {
        self.loads_started
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == file_name)
            .count()
    }

    pub fn load_count(&self) -> usize {
        self.state.lock().unwrap().loads
    }

    pub fn unload_count(&self) -> usize {
        self.state.lock().unwrap().unloads
    }

    /// Most sounds ever loaded at once.
    pub fn peak_loaded(&self) -> usize {
        self.state.lock().unwrap().peak_loaded
    }

    /// Most sounds ever audible at once.
    pub fn peak_playing(&self) -> usize {
        self.state.lock().unwrap().peak_playing
    }

    /// File names of the sounds currently playing.
    pub fn playing_files(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut files: Vec<String> = state
            .sounds
            .values()
            .filter(|s| s.playing)
            .map(|s| s.file_name.clone())
            .collect();
        files.sort();
        files
    }

    pub fn handles(&self) -> Vec<SoundHandle> {
        self.state.lock().unwrap().sounds.keys().copied().collect()
    }

    pub fn is_muted(&self, handle: SoundHandle) -> bool {
        self.state.lock().unwrap().sounds.get(&handle).map_or(false, |s| s.muted)
    }

    /// Simulates a non-looping sound reaching its end.
    pub fn finish(&self, handle: SoundHandle) {
        let on_finish = {
            let mut state = self.state.lock().unwrap();
            let sound = state.sounds.get_mut(&handle).expect("sound is loaded");
            sound.playing = false;
            Arc::clone(&sound.on_finish)
        };
        on_finish(handle);
    }

    /// Simulates the platform dropping a sound behind the controller's back.
    pub fn forget(&self, handle: SoundHandle) {
        self.state.lock().unwrap().sounds.remove(&handle);
    }

    fn with_sound<T>(&self, handle: SoundHandle, f: impl FnOnce(&mut FakeSound) -> T) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        let sound = state
            .sounds
            .get_mut(&handle)
            .ok_or(Error::InvalidHandle(handle.id()))?;
        let value = f(sound);
        let playing = state.playing();
        state.peak_playing = state.peak_playing.max(playing);
        Ok(value)
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn load(&self, path: &Path, _options: LoadOptions, on_finish: FinishCallback) -> Result<SoundHandle> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.loads_started.lock().unwrap().push(file_name.clone());

        let gate = self.load_gates.lock().unwrap().get(&file_name).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Load(path.display().to_string(), e.to_string()))?;
        if bytes.is_empty() || bytes == CORRUPT_BODY {
            return Err(Error::Load(path.display().to_string(), "Unrecognized format".to_string()));
        }

        let handle = SoundHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut state = self.state.lock().unwrap();
        state.loads += 1;
        state.sounds.insert(
            handle,
            FakeSound {
                file_name,
                playing: false,
                muted: false,
                on_finish,
            },
        );
        state.peak_loaded = state.peak_loaded.max(state.sounds.len());
        Ok(handle)
    }

    async fn play(&self, handle: SoundHandle) -> Result<()> {
        self.with_sound(handle, |s| s.playing = true)
    }

    async fn pause(&self, handle: SoundHandle) -> Result<()> {
        self.with_sound(handle, |s| s.playing = false)
    }

    async fn stop(&self, handle: SoundHandle) -> Result<()> {
        self.with_sound(handle, |s| s.playing = false)
    }

    async fn unload(&self, handle: SoundHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .sounds
            .remove(&handle)
            .ok_or(Error::InvalidHandle(handle.id()))?;
        state.unloads += 1;
        Ok(())
    }

    async fn set_muted(&self, handle: SoundHandle, muted: bool) -> Result<()> {
        self.with_sound(handle, |s| s.muted = muted)
    }

    fn loaded_count(&self) -> usize {
        self.state.lock().unwrap().sounds.len()
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub controller: SessionController,
    pub backend: Arc<FakeBackend>,
    pub downloader: Arc<FakeDownloader>,
    pub cache_dir: TempDir,
}

pub fn harness() -> Harness {
    harness_with(LoadOptions::default())
}

pub fn harness_with(options: LoadOptions) -> Harness {
    let cache_dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::new());
    let downloader = Arc::new(FakeDownloader::new());
    let cache = Arc::new(AssetCache::new(cache_dir.path(), downloader.clone()));
    let controller = SessionController::new(backend.clone(), cache, options);

    Harness {
        controller,
        backend,
        downloader,
        cache_dir,
    }
}

/// Lets spawned tasks run until `condition` holds. Gives up after ~5s.
pub async fn settle_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..5_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
