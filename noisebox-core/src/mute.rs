//! Mute bookkeeping, independent of which color is active.

use crate::catalog::ColorId;

/// Remembers which color was active when output was muted so unmuting can
/// bring the same track back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteMemory {
    color_before_mute: Option<ColorId>,
}

impl MuteMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the active color on entering mute.
    pub fn remember(&mut self, color: ColorId) {
        self.color_before_mute = Some(color);
    }

    /// Forgets and returns the remembered color on leaving mute.
    pub fn take(&mut self) -> Option<ColorId> {
        self.color_before_mute.take()
    }

    pub fn clear(&mut self) {
        self.color_before_mute = None;
    }

    pub fn color_before_mute(&self) -> Option<&ColorId> {
        self.color_before_mute.as_ref()
    }
}
