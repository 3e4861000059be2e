//! Session controller: the single owner of the live playback session.
//!
//! Selections and mute toggles may arrive at any time, including while an
//! earlier selection is still downloading or decoding. Transitions are
//! serialized on one async mutex, which is released while resolving and
//! loading. Every selection bumps an epoch; a resolve or load that completes
//! under an older epoch is discarded (a loaded sound is unloaded at once), so
//! at most one sound is ever installed.
//!
//! A switch fetches the new asset before touching the installed track. The
//! old track keeps playing through the download and is only released once
//! the new file is on disk, so a failed download leaves it untouched.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::asset_cache::{AssetCache, DownloadObserver};
use crate::catalog::{ColorId, ColorSelection};
use crate::error::Error;
use crate::mute::MuteMemory;
use crate::playback::{AudioBackend, FinishCallback, LoadOptions, PlaybackSession};
use crate::state::{MuteOutcome, PlayerState, SelectOutcome, SessionPhase};

/// Everything guarded by the transition lock.
struct SessionSlot {
    /// Phase of the installed session: `Idle`, `Loaded`, `Playing` or `Muted`.
    phase: SessionPhase,
    /// The authoritative selection while its resolve or load is in flight:
    /// `Downloading` or `Loading`.
    pending: Option<SessionPhase>,
    /// Present exactly when `phase` is `Loaded`, `Playing` or `Muted`.
    session: Option<PlaybackSession>,
    mute: MuteMemory,
    /// Identifies the authoritative selection.
    epoch: u64,
}

impl SessionSlot {
    fn current(&self) -> &SessionPhase {
        self.pending.as_ref().unwrap_or(&self.phase)
    }

    fn pending_color(&self) -> Option<&ColorId> {
        self.pending.as_ref().and_then(SessionPhase::pending_color)
    }
}

/// Counts downloads the controller is waiting on and mirrors "any in
/// flight" into the observable state.
struct DownloadFlag {
    active: AtomicUsize,
    state_tx: Arc<watch::Sender<PlayerState>>,
}

impl DownloadFlag {
    fn sync(&self) {
        self.state_tx.send_if_modified(|state| {
            let busy = self.active.load(Ordering::SeqCst) > 0;
            if state.is_downloading == busy {
                return false;
            }
            state.is_downloading = busy;
            true
        });
    }
}

impl DownloadObserver for DownloadFlag {
    fn download_started(&self, url: &str) {
        tracing::debug!("Waiting on download: {}", url);
        self.active.fetch_add(1, Ordering::SeqCst);
        self.sync();
    }

    fn download_finished(&self, url: &str) {
        tracing::debug!("Stopped waiting on download: {}", url);
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.sync();
    }
}

struct Inner {
    backend: Arc<dyn AudioBackend>,
    cache: Arc<AssetCache>,
    options: LoadOptions,
    slot: Mutex<SessionSlot>,
    state_tx: Arc<watch::Sender<PlayerState>>,
    downloads: DownloadFlag,
    completions: Arc<AtomicU64>,
}

/// Handle to the session controller. Clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn AudioBackend>, cache: Arc<AssetCache>, options: LoadOptions) -> Self {
        let state_tx = Arc::new(watch::channel(PlayerState::default()).0);

        Self {
            inner: Arc::new(Inner {
                backend,
                cache,
                options,
                slot: Mutex::new(SessionSlot {
                    phase: SessionPhase::Idle,
                    pending: None,
                    session: None,
                    mute: MuteMemory::new(),
                    epoch: 0,
                }),
                downloads: DownloadFlag {
                    active: AtomicUsize::new(0),
                    state_tx: Arc::clone(&state_tx),
                },
                state_tx,
                completions: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Handles the user picking a color.
    ///
    /// Picking the playing color turns it off; picking the muted or paused
    /// color brings it back; picking anything else switches tracks. Errors
    /// never escape: they become [`SelectOutcome::Failed`] and `last_error`.
    pub async fn select_color(&self, selection: ColorSelection) -> SelectOutcome {
        let color = selection.color.clone();

        let epoch = {
            let mut slot = self.inner.slot.lock().await;

            if slot.pending_color() == Some(&color) {
                tracing::debug!("Ignoring repeat selection of {} while {}", color, slot.current());
                return SelectOutcome::Ignored;
            }

            if slot.phase.loaded_color() == Some(&color) {
                // The installed color wins over whatever was still on its way.
                if slot.pending.is_some() {
                    slot.epoch += 1;
                    self.set_pending(&mut slot, None);
                }
                return match slot.phase.clone() {
                    SessionPhase::Playing(_) => self.stop_current(&mut slot).await,
                    SessionPhase::Muted(_) => match self.unmute(&mut slot).await {
                        MuteOutcome::Unmuted(c) => SelectOutcome::Resumed(c),
                        MuteOutcome::Failed(e) => SelectOutcome::Failed(e),
                        _ => SelectOutcome::Ignored,
                    },
                    _ => self.resume(&mut slot).await,
                };
            }

            slot.epoch += 1;
            self.set_pending(&mut slot, Some(SessionPhase::Downloading(color.clone())));
            slot.epoch
        };

        let path = match self
            .inner
            .cache
            .resolve(&selection.url, &self.inner.downloads)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                let mut slot = self.inner.slot.lock().await;
                return self.fail_selection(&mut slot, epoch, &color, e);
            }
        };

        {
            let mut slot = self.inner.slot.lock().await;
            if slot.epoch != epoch {
                tracing::info!("Dropping resolved asset for {}: selection moved on", color);
                return SelectOutcome::Superseded;
            }
            // The new asset is local; only now does the old track go.
            self.release(&mut slot).await;
            self.set_phase(&mut slot, SessionPhase::Idle);
            self.set_pending(&mut slot, Some(SessionPhase::Loading(color.clone())));
            self.publish(&slot, None);
        }

        let loaded = PlaybackSession::load(
            Arc::clone(&self.inner.backend),
            color.clone(),
            &path,
            self.inner.options,
            self.finish_callback(),
        )
        .await;

        let mut slot = self.inner.slot.lock().await;
        let mut session = match loaded {
            Ok(session) => session,
            Err(e) => return self.fail_selection(&mut slot, epoch, &color, e),
        };

        if slot.epoch != epoch {
            tracing::warn!("Discarding stale load of {} ({})", color, session.handle());
            if let Err(e) = session.unload().await {
                tracing::warn!("Failed to unload stale sound for {}: {}", color, e);
            }
            return SelectOutcome::Superseded;
        }

        if let Err(e) = session.play().await {
            if let Err(unload_err) = session.unload().await {
                tracing::warn!("Failed to unload {} after play error: {}", color, unload_err);
            }
            return self.fail_selection(&mut slot, epoch, &color, e);
        }

        slot.session = Some(session);
        self.set_pending(&mut slot, None);
        self.set_phase(&mut slot, SessionPhase::Playing(color.clone()));
        self.publish(&slot, None);
        SelectOutcome::Started(color)
    }

    /// Handles the mute/speaker control. Acts on the installed track, even
    /// while another color is downloading.
    pub async fn toggle_mute(&self) -> MuteOutcome {
        let mut slot = self.inner.slot.lock().await;

        match slot.phase.clone() {
            SessionPhase::Playing(color) => {
                let Some(session) = slot.session.as_mut() else {
                    return MuteOutcome::NoOp;
                };
                match session.set_muted(true).await {
                    Ok(()) => {
                        slot.mute.remember(color.clone());
                        self.set_phase(&mut slot, SessionPhase::Muted(color.clone()));
                        self.publish(&slot, None);
                        MuteOutcome::Muted(color)
                    }
                    Err(e) => MuteOutcome::Failed(self.session_error(&mut slot, e)),
                }
            }
            SessionPhase::Muted(_) => self.unmute(&mut slot).await,
            _ => {
                tracing::debug!("Mute toggle ignored while {}", slot.current());
                MuteOutcome::NoOp
            }
        }
    }

    /// Pauses the playing (or muted) track, keeping it loaded.
    ///
    /// Returns false if nothing was playing.
    pub async fn pause(&self) -> bool {
        let mut slot = self.inner.slot.lock().await;

        let color = match slot.phase.clone() {
            SessionPhase::Playing(c) | SessionPhase::Muted(c) => c,
            _ => return false,
        };
        let Some(session) = slot.session.as_mut() else {
            return false;
        };

        match session.pause().await {
            Ok(()) => {
                slot.mute.clear();
                self.set_phase(&mut slot, SessionPhase::Loaded(color));
                self.publish(&slot, None);
                true
            }
            Err(e) => {
                self.session_error(&mut slot, e);
                false
            }
        }
    }

    /// Unloads everything and discards in-flight selections. Call when the
    /// host screen goes away.
    pub async fn shutdown(&self) {
        let mut slot = self.inner.slot.lock().await;
        slot.epoch += 1;
        self.set_pending(&mut slot, None);
        self.release(&mut slot).await;
        self.set_phase(&mut slot, SessionPhase::Idle);
        self.publish(&slot, None);
    }

    /// Current observable state.
    pub fn state(&self) -> PlayerState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribes to observable state changes.
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.inner.state_tx.subscribe()
    }

    /// Current phase of the state machine. An in-flight selection
    /// (`Downloading`/`Loading`) takes precedence over the installed track.
    pub async fn phase(&self) -> SessionPhase {
        self.inner.slot.lock().await.current().clone()
    }

    /// Phase of the installed track alone.
    pub async fn installed_phase(&self) -> SessionPhase {
        self.inner.slot.lock().await.phase.clone()
    }

    /// The color remembered from before muting, if muted.
    pub async fn color_before_mute(&self) -> Option<ColorId> {
        self.inner.slot.lock().await.mute.color_before_mute().cloned()
    }

    /// How many times a non-looping track reached its end.
    pub fn completions(&self) -> u64 {
        self.inner.completions.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &AssetCache {
        &self.inner.cache
    }

    // ------------------------------------------------------------------
    // Transitions. All take the locked slot.
    // ------------------------------------------------------------------

    /// Playing(c) + c: turn it off.
    async fn stop_current(&self, slot: &mut SessionSlot) -> SelectOutcome {
        let color = slot.phase.loaded_color().cloned();
        slot.epoch += 1;
        self.release(slot).await;
        self.set_phase(slot, SessionPhase::Idle);
        self.publish(slot, None);
        match color {
            Some(color) => SelectOutcome::Stopped(color),
            None => SelectOutcome::Ignored,
        }
    }

    /// Loaded(c) + c: start playing again.
    async fn resume(&self, slot: &mut SessionSlot) -> SelectOutcome {
        let Some(color) = slot.phase.loaded_color().cloned() else {
            return SelectOutcome::Ignored;
        };
        let Some(session) = slot.session.as_mut() else {
            return SelectOutcome::Ignored;
        };

        let result = if session.is_muted() {
            session.set_muted(false).await
        } else {
            Ok(())
        };
        let result = match result {
            Ok(()) => session.play().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.set_phase(slot, SessionPhase::Playing(color.clone()));
                self.publish(slot, None);
                SelectOutcome::Resumed(color)
            }
            Err(e) => SelectOutcome::Failed(self.session_error(slot, e)),
        }
    }

    /// Muted(c) -> Playing(c), same handle.
    async fn unmute(&self, slot: &mut SessionSlot) -> MuteOutcome {
        let SessionPhase::Muted(color) = slot.phase.clone() else {
            return MuteOutcome::NoOp;
        };
        let Some(session) = slot.session.as_mut() else {
            return MuteOutcome::NoOp;
        };

        match session.set_muted(false).await {
            Ok(()) => {
                let color = slot.mute.take().unwrap_or(color);
                self.set_phase(slot, SessionPhase::Playing(color.clone()));
                self.publish(slot, None);
                MuteOutcome::Unmuted(color)
            }
            Err(e) => MuteOutcome::Failed(self.session_error(slot, e)),
        }
    }

    /// Stops and unloads the installed session, if any, and forgets mute.
    async fn release(&self, slot: &mut SessionSlot) {
        slot.mute.clear();
        if let Some(session) = slot.session.take() {
            let color = session.color().clone();
            if let Err(e) = session.unload().await {
                tracing::warn!("Error releasing {}: {}", color, e);
            }
        }
    }

    /// Downgrades a failed resolve/load/play to "selection failed". The
    /// installed track, if any, is left as it was.
    fn fail_selection(&self, slot: &mut SessionSlot, epoch: u64, color: &ColorId, e: Error) -> SelectOutcome {
        if slot.epoch != epoch {
            tracing::info!("Ignoring failure of superseded selection {}: {}", color, e);
            return SelectOutcome::Superseded;
        }

        let message = e.to_string();
        tracing::warn!("Selecting {} failed: {}", color, message);
        self.set_pending(slot, None);
        self.publish(slot, Some(message.clone()));
        SelectOutcome::Failed(message)
    }

    /// Reports an error from the installed session. A handle the backend no
    /// longer knows is dropped; otherwise the phase is left as it was.
    fn session_error(&self, slot: &mut SessionSlot, e: Error) -> String {
        let message = e.to_string();
        tracing::warn!("Session error while {}: {}", slot.phase, message);

        if matches!(e, Error::InvalidHandle(_)) {
            slot.session = None;
            slot.mute.clear();
            self.set_phase(slot, SessionPhase::Idle);
        }
        self.publish(slot, Some(message.clone()));
        message
    }

    fn set_phase(&self, slot: &mut SessionSlot, phase: SessionPhase) {
        if slot.phase != phase {
            tracing::info!("Session {} -> {}", slot.phase, phase);
            slot.phase = phase;
        }
    }

    fn set_pending(&self, slot: &mut SessionSlot, pending: Option<SessionPhase>) {
        if slot.pending != pending {
            match &pending {
                Some(phase) => tracing::info!("Selection now {}", phase),
                None => tracing::debug!("No selection in flight"),
            }
            slot.pending = pending;
        }
    }

    /// Publishes the installed track's state. In-flight selections show up
    /// only through `is_downloading`.
    fn publish(&self, slot: &SessionSlot, error: Option<String>) {
        self.inner.state_tx.send_modify(|state| {
            state.apply_phase(&slot.phase);
            state.last_error = error;
        });
    }

    fn finish_callback(&self) -> FinishCallback {
        let completions = Arc::clone(&self.inner.completions);
        Arc::new(move |handle| {
            let total = completions.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!("Track {} completed (total {})", handle, total);
        })
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .finish()
    }
}
