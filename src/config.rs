//! Conductor configuration.
//!
//! Loaded once at startup from an optional TOML file, then overridden from
//! the command line or environment by the binary, then validated. Every
//! section has defaults matching a typical shop installation.
//!
//! # Example
//!
//! ```rust
//! use rs_conductor::config::{ConductorConfig, PresenceConfig, ShowConfig};
//!
//! // Use defaults
//! let config = ConductorConfig::default();
//! assert!(config.validate().is_ok());
//!
//! // Or customize
//! let config = ConductorConfig::default()
//!     .with_show(ShowConfig::default().with_tracks_to_play(3))
//!     .with_presence(PresenceConfig::default().with_enabled(false));
//!
//! // Or from a file
//! let config = ConductorConfig::from_toml_str(r#"
//!     [hours]
//!     open = "10:00"
//!     close = "18:30:00"
//!
//!     [show]
//!     tracks_to_play = 4
//! "#).unwrap();
//! assert_eq!(config.show.tracks_to_play, 4);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hours::ShopHours;
use crate::speed_profile::SpeedCurveParams;

// ============================================================================
// Main Config
// ============================================================================

/// Complete conductor configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Business hours
    pub hours: ShopHours,
    /// Show sequencing
    pub show: ShowConfig,
    /// Train presence sensing
    pub presence: PresenceConfig,
    /// Speed curve shape
    pub speed: SpeedCurveParams,
    /// Control loop timing
    pub scheduler: SchedulerConfig,
    /// Music library
    pub media: MediaConfig,
}

impl ConductorConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check every section. Call before entering the control loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.show.validate()?;
        self.presence.validate()?;
        self.speed.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }

    /// Set business hours
    pub fn with_hours(mut self, hours: ShopHours) -> Self {
        self.hours = hours;
        self
    }

    /// Set show configuration
    pub fn with_show(mut self, show: ShowConfig) -> Self {
        self.show = show;
        self
    }

    /// Set presence configuration
    pub fn with_presence(mut self, presence: PresenceConfig) -> Self {
        self.presence = presence;
        self
    }

    /// Set speed curve parameters
    pub fn with_speed(mut self, speed: SpeedCurveParams) -> Self {
        self.speed = speed;
        self
    }

    /// Set scheduler timing
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set media configuration
    pub fn with_media(mut self, media: MediaConfig) -> Self {
        self.media = media;
        self
    }
}

/// Longest accepted cooldown between shows, one day.
pub const MAX_BREAK_TIME_SECS: u64 = 86_400;

/// Smallest accepted spin-down decrement, in duty-cycle percent.
pub const MIN_SPIN_DOWN_STEP: f32 = 0.01;

fn out_of_range(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        reason: reason.to_string(),
    }
}

// ============================================================================
// Show Config
// ============================================================================

/// Show sequencing configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    /// Playlist tracks per show, after the intro
    pub tracks_to_play: u32,
    /// Cooldown between shows in seconds
    pub break_time_secs: u64,
    /// Player volume level for the intro track
    pub intro_volume: u8,
    /// Player volume level for playlist tracks
    pub playlist_volume: u8,
    /// Wait used when a track cannot be played or has no known duration
    pub fallback_track_secs: u64,
    /// Total time of the final linear spin-down from cruise speed
    pub spin_down_ms: u64,
    /// Duty-cycle decrement per spin-down step
    pub spin_down_step: f32,
    /// Speed curve update interval in milliseconds
    pub ramp_tick_ms: u64,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            tracks_to_play: 2,
            break_time_secs: 300,
            intro_volume: 4,
            playlist_volume: 2,
            fallback_track_secs: 40,
            spin_down_ms: 2000,
            spin_down_step: 1.0,
            ramp_tick_ms: 200,
        }
    }
}

impl ShowConfig {
    /// Set the number of playlist tracks
    pub fn with_tracks_to_play(mut self, n: u32) -> Self {
        self.tracks_to_play = n;
        self
    }

    /// Set the cooldown between shows
    pub fn with_break_time_secs(mut self, secs: u64) -> Self {
        self.break_time_secs = secs;
        self
    }

    /// Set the intro and playlist volume levels
    pub fn with_volumes(mut self, intro: u8, playlist: u8) -> Self {
        self.intro_volume = intro;
        self.playlist_volume = playlist;
        self
    }

    /// Set the fallback track duration
    pub fn with_fallback_track_secs(mut self, secs: u64) -> Self {
        self.fallback_track_secs = secs;
        self
    }

    /// Set the spin-down duration
    pub fn with_spin_down_ms(mut self, ms: u64) -> Self {
        self.spin_down_ms = ms;
        self
    }

    /// Set the duty-cycle decrement per spin-down step
    pub fn with_spin_down_step(mut self, step: f32) -> Self {
        self.spin_down_step = step;
        self
    }

    /// Set the speed curve tick
    pub fn with_ramp_tick_ms(mut self, ms: u64) -> Self {
        self.ramp_tick_ms = ms;
        self
    }

    /// Cooldown as a `Duration`
    pub fn break_time(&self) -> Duration {
        Duration::from_secs(self.break_time_secs)
    }

    /// Fallback track duration as a `Duration`
    pub fn fallback_duration(&self) -> Duration {
        Duration::from_secs(self.fallback_track_secs)
    }

    /// Spin-down duration as a `Duration`
    pub fn spin_down(&self) -> Duration {
        Duration::from_millis(self.spin_down_ms)
    }

    /// Ramp tick as a `Duration`
    pub fn ramp_tick(&self) -> Duration {
        Duration::from_millis(self.ramp_tick_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tracks_to_play == 0 {
            return Err(out_of_range("show.tracks_to_play", "must be at least 1"));
        }
        if self.break_time_secs > MAX_BREAK_TIME_SECS {
            return Err(out_of_range("show.break_time_secs", "must be at most one day"));
        }
        if self.fallback_track_secs == 0 {
            return Err(out_of_range("show.fallback_track_secs", "must be at least 1"));
        }
        if !(MIN_SPIN_DOWN_STEP..=100.0).contains(&self.spin_down_step) {
            return Err(out_of_range("show.spin_down_step", "must lie within 0.01..=100"));
        }
        if self.ramp_tick_ms == 0 || self.ramp_tick_ms > 1000 {
            return Err(out_of_range("show.ramp_tick_ms", "must lie within 1..=1000"));
        }
        Ok(())
    }
}

// ============================================================================
// Presence Config
// ============================================================================

/// Train presence sensing configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Whether to wait for the train after the playlist
    pub enabled: bool,
    /// Seconds to wait for a sighting before alerting
    pub limit_secs: u64,
    /// Seconds to keep running after the wait, so the train reaches its stop
    pub settle_secs: u64,
    /// Deadline poll interval in milliseconds
    pub poll_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit_secs: 40,
            settle_secs: 3,
            poll_ms: 200,
        }
    }
}

impl PresenceConfig {
    /// Enable or disable presence sensing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the sighting deadline
    pub fn with_limit_secs(mut self, secs: u64) -> Self {
        self.limit_secs = secs;
        self
    }

    /// Set the settle delay
    pub fn with_settle_secs(mut self, secs: u64) -> Self {
        self.settle_secs = secs;
        self
    }

    /// Deadline as a `Duration`
    pub fn limit(&self) -> Duration {
        Duration::from_secs(self.limit_secs)
    }

    /// Settle delay as a `Duration`
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_ms == 0 {
            return Err(out_of_range("presence.poll_ms", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Scheduler Config
// ============================================================================

/// Control loop timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Poll interval in milliseconds
    pub tick_ms: u64,
    /// Minimum interval between heartbeat log lines
    pub heartbeat_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            heartbeat_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    /// Set the poll interval
    pub fn with_tick_ms(mut self, ms: u64) -> Self {
        self.tick_ms = ms;
        self
    }

    /// Set the heartbeat interval
    pub fn with_heartbeat_ms(mut self, ms: u64) -> Self {
        self.heartbeat_ms = ms;
        self
    }

    /// Poll interval as a `Duration`
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Heartbeat interval as a `Duration`
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(out_of_range("scheduler.tick_ms", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Media Config
// ============================================================================

/// Music library configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory holding the `.mp3` files
    pub library_path: PathBuf,
    /// External player command, e.g. `"mpg123 -q"`. The track path is
    /// appended. Without one, playback is simulated.
    pub player_command: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from("/media/usb"),
            player_command: None,
        }
    }
}

impl MediaConfig {
    /// Set the library directory
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = path.into();
        self
    }

    /// Set the player command
    pub fn with_player_command(mut self, command: impl Into<String>) -> Self {
        self.player_command = Some(command.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
