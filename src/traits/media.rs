//! Track selection and playback.
//!
//! The conductor never decodes audio itself. A [`MediaSource`] hands out
//! [`TrackRef`]s, starts playback and reports how long the track runs; the
//! sequencer does the waiting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MediaError;

/// A playable track and its duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRef {
    /// Location of the audio file.
    pub path: PathBuf,
    /// Playback length. Always greater than zero.
    pub duration: Duration,
}

impl TrackRef {
    /// Create a track reference.
    ///
    /// Returns `None` for a zero duration.
    pub fn new(path: impl Into<PathBuf>, duration: Duration) -> Option<Self> {
        if duration.is_zero() {
            return None;
        }
        Some(Self {
            path: path.into(),
            duration,
        })
    }

    /// File name for log output, falling back to the full path.
    pub fn name(&self) -> std::borrow::Cow<'_, str> {
        display_name(&self.path)
    }
}

pub(crate) fn display_name(path: &Path) -> std::borrow::Cow<'_, str> {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
}

/// Source of show music.
///
/// Every call may fail; the sequencer recovers by skipping the slot and
/// waiting the configured fallback duration instead.
pub trait MediaSource {
    /// All playable tracks, intro tracks included.
    fn list_tracks(&mut self) -> Result<Vec<TrackRef>, MediaError>;

    /// A random track from the intro ("upbeat") pool.
    fn pick_upbeat_track(&mut self) -> Result<TrackRef, MediaError>;

    /// A random playlist track.
    ///
    /// Must not return `exclude` when at least one other playlist track
    /// exists.
    fn pick_next_track(&mut self, exclude: Option<&TrackRef>) -> Result<TrackRef, MediaError>;

    /// Start playing `track`, replacing whatever was playing.
    ///
    /// Returns immediately with the playback duration.
    fn play(&mut self, track: &TrackRef) -> Result<Duration, MediaError>;

    /// Set the output volume level for the current and following tracks.
    fn set_volume(&mut self, level: u8) -> Result<(), MediaError>;

    /// Stop playback. Default is a no-op for sources that stop on their own.
    fn stop(&mut self) -> Result<(), MediaError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_ref_rejects_zero_duration() {
        assert!(TrackRef::new("a.mp3", Duration::ZERO).is_none());
        assert!(TrackRef::new("a.mp3", Duration::from_millis(1)).is_some());
    }

    #[test]
    fn track_name_is_file_name() {
        let track = TrackRef::new("/media/usb/upbeat_1.mp3", Duration::from_secs(3)).unwrap();
        assert_eq!(track.name(), "upbeat_1.mp3");
    }
}
