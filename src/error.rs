//! Error types for the conductor.
//!
//! Startup problems ([`ConfigError`], actuator setup failures wrapped in
//! [`ConductorError`]) are fatal. [`MediaError`] never leaves a show: the
//! sequencer logs it and substitutes the fallback duration.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A time-of-day string could not be parsed.
    #[error("invalid time of day '{value}' for {field} (expected HH:MM or HH:MM:SS)")]
    InvalidTime {
        /// Configuration key that held the value.
        field: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A numeric setting is outside its allowed range.
    #[error("{field} out of range: {reason}")]
    OutOfRange {
        /// Configuration key that held the value.
        field: &'static str,
        /// What the constraint is.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`ConductorConfig`].
    ///
    /// [`ConductorConfig`]: crate::config::ConductorConfig
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure of a [`MediaSource`](crate::traits::MediaSource) call.
#[derive(Error, Debug)]
pub enum MediaError {
    /// The library has no tracks of the requested kind.
    #[error("no {0} tracks available")]
    NoTracks(&'static str),

    /// A track file disappeared or was never there.
    #[error("track not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The track's playback duration could not be determined.
    #[error("duration unavailable for {}: {reason}", .path.display())]
    Duration {
        /// Track file.
        path: PathBuf,
        /// Why probing failed.
        reason: String,
    },

    /// The player refused or crashed.
    #[error("player fault: {0}")]
    Player(String),

    /// Filesystem error while listing or opening tracks.
    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for conductor setup and shutdown.
#[derive(Error, Debug)]
pub enum ConductorError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The actuator failed during setup or forced shutdown.
    #[error("actuator fault: {0}")]
    Actuator(String),
}
