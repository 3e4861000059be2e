//! C FFI layer for Swift/Kotlin hosts.
//!
//! The player is exposed as an opaque handle that owns its own tokio runtime.
//! Selection runs on that runtime and returns at once; hosts follow its
//! progress through `noisebox_state_json`. Mute and pause never wait on the
//! network and block until they settle. All functions are `extern "C"` and
//! use raw pointers for interop.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::OnceLock;

use serde::Serialize;

use crate::config::ConfigLoader;
use crate::engines::audio_output;
use crate::logging::{self, LogBuffer};
use crate::player::Player;
use crate::state::{MuteOutcome, SelectOutcome};

/// Result codes of [`noisebox_select_color`].
pub const SELECT_PENDING: i32 = 0;
pub const SELECT_UNKNOWN_COLOR: i32 = -2;
pub const SELECT_INVALID_ARGUMENT: i32 = -3;

/// Opaque handle for a Player and the runtime driving it.
pub struct FfiPlayer {
    runtime: tokio::runtime::Runtime,
    player: Player,
}

/// Process-wide log buffer, created with the first player.
static LOG_BUFFER: OnceLock<LogBuffer> = OnceLock::new();

fn log_buffer() -> &'static LogBuffer {
    LOG_BUFFER.get_or_init(|| {
        let buffer = logging::new_log_buffer();
        logging::init_logging(buffer.clone());
        buffer
    })
}

unsafe fn read_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn to_c_json<T: Serialize + ?Sized>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => to_c_string(json),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Player
// ============================================================================

/// Creates a player from a YAML config file.
///
/// Downloaded assets go to `cache_dir` unless the config sets its own.
/// Returns null if the config cannot be loaded or the runtime cannot start.
///
/// # Safety
/// - `config_path` and `cache_dir` must be valid null-terminated UTF-8 strings
/// - The returned pointer must be freed with `noisebox_player_free`
#[no_mangle]
pub unsafe extern "C" fn noisebox_player_new(
    config_path: *const c_char,
    cache_dir: *const c_char,
) -> *mut FfiPlayer {
    let (Some(config_path), Some(cache_dir)) = (read_str(config_path), read_str(cache_dir)) else {
        return ptr::null_mut();
    };
    log_buffer();

    let config = match ConfigLoader::new().load(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ptr::null_mut();
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ptr::null_mut();
        }
    };

    let player = match Player::with_defaults(&config, cache_dir) {
        Ok(player) => player,
        Err(e) => {
            tracing::error!("Failed to create player: {}", e);
            return ptr::null_mut();
        }
    };

    Box::into_raw(Box::new(FfiPlayer { runtime, player }))
}

/// Shuts the player down and frees it.
///
/// # Safety
/// - `player` must be a valid pointer returned by `noisebox_player_new`, or null
/// - `player` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn noisebox_player_free(player: *mut FfiPlayer) {
    if player.is_null() {
        return;
    }
    let ffi = Box::from_raw(player);
    ffi.runtime.block_on(ffi.player.shutdown());
    drop(ffi);
}

/// Queues a color selection and returns without waiting for it.
///
/// Returns `SELECT_PENDING` once the selection is running, or a negative
/// code if the id is unknown or the arguments are bad. The outcome shows up
/// in the state JSON (`active_color`, `is_downloading`, `last_error`).
///
/// # Safety
/// - `player` must be a valid pointer
/// - `color_id` must be a valid null-terminated UTF-8 string
#[no_mangle]
pub unsafe extern "C" fn noisebox_select_color(player: *const FfiPlayer, color_id: *const c_char) -> i32 {
    if player.is_null() {
        return SELECT_INVALID_ARGUMENT;
    }
    let Some(color_id) = read_str(color_id) else {
        return SELECT_INVALID_ARGUMENT;
    };

    let ffi = &*player;
    if ffi.player.catalog().get(color_id).is_none() {
        tracing::warn!("Unknown color: {}", color_id);
        return SELECT_UNKNOWN_COLOR;
    }

    let player = ffi.player.clone();
    let color_id = color_id.to_string();
    ffi.runtime.spawn(async move {
        match player.select(&color_id).await {
            Ok(SelectOutcome::Failed(reason)) => {
                tracing::debug!("Selection of {} failed: {}", color_id, reason)
            }
            Ok(outcome) => tracing::debug!("Selection of {} finished: {:?}", color_id, outcome),
            Err(e) => tracing::error!("{}", e),
        }
    });
    SELECT_PENDING
}

/// Deletes the cached files of the catalog colors.
///
/// Returns the number of files removed, or -1 on error.
///
/// # Safety
/// - `player` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn noisebox_clear_cache(player: *const FfiPlayer) -> i32 {
    if player.is_null() {
        return -1;
    }
    match (*player).player.clear_cache() {
        Ok(count) => count as i32,
        Err(e) => {
            tracing::error!("Failed to clear cache: {}", e);
            -1
        }
    }
}

/// Toggles mute. Returns true if the output changed.
///
/// # Safety
/// - `player` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn noisebox_toggle_mute(player: *const FfiPlayer) -> bool {
    if player.is_null() {
        return false;
    }
    let ffi = &*player;
    matches!(
        ffi.runtime.block_on(ffi.player.toggle_mute()),
        MuteOutcome::Muted(_) | MuteOutcome::Unmuted(_)
    )
}

/// Pauses the current track. Returns false if nothing was playing.
///
/// # Safety
/// - `player` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn noisebox_pause(player: *const FfiPlayer) -> bool {
    if player.is_null() {
        return false;
    }
    let ffi = &*player;
    ffi.runtime.block_on(ffi.player.pause())
}

/// Returns the observable player state as JSON.
///
/// # Safety
/// - `player` must be a valid pointer
/// - The returned string must be freed with `noisebox_free_string`
#[no_mangle]
pub unsafe extern "C" fn noisebox_state_json(player: *const FfiPlayer) -> *mut c_char {
    if player.is_null() {
        return ptr::null_mut();
    }
    to_c_json(&(*player).player.state())
}

/// Returns the color catalog as a JSON array.
///
/// # Safety
/// - `player` must be a valid pointer
/// - The returned string must be freed with `noisebox_free_string`
#[no_mangle]
pub unsafe extern "C" fn noisebox_catalog_json(player: *const FfiPlayer) -> *mut c_char {
    if player.is_null() {
        return ptr::null_mut();
    }
    to_c_json((*player).player.catalog().colors())
}

// ============================================================================
// Debug log
// ============================================================================

/// Returns the buffered log lines as a JSON array, oldest first.
///
/// # Ownership
/// - The returned string must be freed with `noisebox_free_string`
#[no_mangle]
pub extern "C" fn noisebox_debug_log_json() -> *mut c_char {
    to_c_json(&logging::snapshot(log_buffer()))
}

/// Empties the log buffer.
#[no_mangle]
pub extern "C" fn noisebox_debug_log_clear() {
    logging::clear(log_buffer());
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Returns whether an audio output device could be opened.
#[no_mangle]
pub extern "C" fn noisebox_audio_available() -> bool {
    audio_output::is_audio_available()
}

/// Frees a string returned by an FFI function.
///
/// # Safety
/// - `s` must be a valid pointer returned by a noisebox FFI function, or null
#[no_mangle]
pub unsafe extern "C" fn noisebox_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Returns the library version as a string.
///
/// # Ownership
/// - The returned string must be freed with `noisebox_free_string`
#[no_mangle]
pub extern "C" fn noisebox_version() -> *mut c_char {
    to_c_string(env!("CARGO_PKG_VERSION").to_string())
}

// ============================================================================
// Tests
// ============================================================================
