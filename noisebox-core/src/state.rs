//! Controller phases and the state hosts observe.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::catalog::ColorId;

/// Value hosts see as the active color while output is muted. Catalogs may
/// not use it as a color id.
pub const MUTED_SENTINEL: &str = "muted";

/// Where the session controller is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No sound loaded.
    Idle,
    /// Resolving the color's asset (cache check, then download on a miss).
    Downloading(ColorId),
    /// Decoding the resolved file.
    Loading(ColorId),
    /// Sound loaded but not playing.
    Loaded(ColorId),
    Playing(ColorId),
    /// Playing with output silenced; holds the pre-mute color.
    Muted(ColorId),
}

impl SessionPhase {
    /// The color whose resolve or load is in flight, if any.
    pub fn pending_color(&self) -> Option<&ColorId> {
        match self {
            Self::Downloading(c) | Self::Loading(c) => Some(c),
            _ => None,
        }
    }

    /// The color of the installed session, if any.
    pub fn loaded_color(&self) -> Option<&ColorId> {
        match self {
            Self::Loaded(c) | Self::Playing(c) | Self::Muted(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Downloading(c) => write!(f, "Downloading({})", c),
            Self::Loading(c) => write!(f, "Loading({})", c),
            Self::Loaded(c) => write!(f, "Loaded({})", c),
            Self::Playing(c) => write!(f, "Playing({})", c),
            Self::Muted(c) => write!(f, "Muted({})", c),
        }
    }
}

/// The active color as shown to hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveColor {
    Color(ColorId),
    /// Output is muted; the real color is kept internally.
    Muted,
}

impl ActiveColor {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Color(c) => c.as_str(),
            Self::Muted => MUTED_SENTINEL,
        }
    }
}

impl Serialize for ActiveColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Observable state, recomputed after every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerState {
    pub active_color: Option<ActiveColor>,
    pub is_muted: bool,
    pub is_downloading: bool,
    /// Set when the last selection or mute toggle failed; cleared by the
    /// next successful transition.
    pub last_error: Option<String>,
}

impl PlayerState {
    /// The active color id, `"muted"`, or `None`.
    pub fn active_color_id(&self) -> Option<&str> {
        self.active_color.as_ref().map(ActiveColor::as_str)
    }

    /// Updates the phase-derived fields. `is_downloading` is tracked separately.
    pub(crate) fn apply_phase(&mut self, phase: &SessionPhase) {
        let (active, muted) = match phase {
            SessionPhase::Playing(c) => (Some(ActiveColor::Color(c.clone())), false),
            SessionPhase::Muted(_) => (Some(ActiveColor::Muted), true),
            _ => (None, false),
        };
        self.active_color = active;
        self.is_muted = muted;
    }
}

/// What a color selection did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A new track is playing.
    Started(ColorId),
    /// The loaded or muted track is audible again.
    Resumed(ColorId),
    /// The playing track was turned off.
    Stopped(ColorId),
    /// Same color already in flight; nothing to do.
    Ignored,
    /// A newer selection took over before this one finished.
    Superseded,
    /// The selection failed; the message is also in `last_error`.
    Failed(String),
}

/// What a mute toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuteOutcome {
    Muted(ColorId),
    Unmuted(ColorId),
    /// Nothing is playing.
    NoOp,
    Failed(String),
}
