//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for every collaborator trait, so whole
//! shows can run on a desktop under tokio's paused clock.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockActuator`] | [`Actuator`] | Records every output change with its time |
//! | [`MockMedia`] | [`MediaSource`] | Scripted tracks, failures and a play log |
//! | [`MockAlerts`] | [`AlertSink`] | Captures alert messages |
//! | [`MockClock`] | [`Clock`] | Settable time of day |
//!
//! `MockMedia`, `MockAlerts` and `MockClock` are cheap handles over shared
//! state: keep a clone in the test to inspect or steer the copy the
//! conductor owns.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rs_conductor::hal::MockMedia;
//! use rs_conductor::traits::MediaSource;
//!
//! let mut media = MockMedia::new()
//!     .with_upbeat("upbeat_intro.mp3", 30)
//!     .with_track("a.mp3", 60)
//!     .with_track("b.mp3", 90);
//! let handle = media.clone();
//!
//! let intro = media.pick_upbeat_track().unwrap();
//! assert_eq!(media.play(&intro).unwrap(), Duration::from_secs(30));
//!
//! let a = media.pick_next_track(None).unwrap();
//! let b = media.pick_next_track(Some(&a)).unwrap();
//! assert_ne!(a, b);
//!
//! assert_eq!(handle.played().len(), 1);
//! ```
//!
//! [`Actuator`]: crate::traits::Actuator
//! [`MediaSource`]: crate::traits::MediaSource
//! [`AlertSink`]: crate::traits::AlertSink
//! [`Clock`]: crate::traits::Clock

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveTime;
use tokio::time::Instant;

use crate::error::MediaError;
use crate::traits::{Actuator, AlertSink, Clock, MediaSource, TrackRef};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Hardware Mocks
// ============================================================================

/// One recorded output write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutputChange {
    /// `set_enable`
    Enable(bool),
    /// `set_duty_cycle`
    Duty(f32),
    /// `set_open_signal`
    Open(bool),
}

/// Mock actuator for testing.
///
/// Current output levels are public fields; [`events`](Self::events) holds
/// every write in order with the tokio time it happened.
///
/// # Example
///
/// ```rust
/// use rs_conductor::hal::{MockActuator, OutputChange};
/// use rs_conductor::traits::Actuator;
///
/// let mut actuator = MockActuator::new();
/// actuator.set_open_signal(true).unwrap();
/// actuator.set_duty_cycle(25.0).unwrap();
///
/// assert!(actuator.open_signal);
/// assert_eq!(actuator.duty_writes(), vec![25.0]);
/// assert_eq!(actuator.changes()[0], OutputChange::Open(true));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockActuator {
    /// Motor-enable relay state.
    pub enabled: bool,
    /// Last commanded duty cycle.
    pub duty_cycle: f32,
    /// Open line state.
    pub open_signal: bool,
    /// Every write, in order.
    pub events: Vec<(Instant, OutputChange)>,
    /// When set, every write fails (after being recorded).
    pub fail: bool,
}

impl MockActuator {
    /// Creates a mock actuator with all outputs low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write return an error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn record(&mut self, change: OutputChange) -> Result<(), ()> {
        self.events.push((Instant::now(), change));
        if self.fail {
            Err(())
        } else {
            Ok(())
        }
    }

    /// Writes without timestamps.
    pub fn changes(&self) -> Vec<OutputChange> {
        self.events.iter().map(|(_, c)| *c).collect()
    }

    /// All duty-cycle values written, in order.
    pub fn duty_writes(&self) -> Vec<f32> {
        self.events
            .iter()
            .filter_map(|(_, c)| match c {
                OutputChange::Duty(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    /// All motor-enable values written, in order.
    pub fn enable_writes(&self) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|(_, c)| match c {
                OutputChange::Enable(on) => Some(*on),
                _ => None,
            })
            .collect()
    }
}

impl Actuator for MockActuator {
    type Error = ();

    fn set_enable(&mut self, on: bool) -> Result<(), ()> {
        self.enabled = on;
        self.record(OutputChange::Enable(on))
    }

    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), ()> {
        self.duty_cycle = percent;
        self.record(OutputChange::Duty(percent))
    }

    fn set_open_signal(&mut self, on: bool) -> Result<(), ()> {
        self.open_signal = on;
        self.record(OutputChange::Open(on))
    }
}

/// Mock clock for testing.
///
/// Clones share the same time, so a test can move the clock the conductor
/// reads from.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveTime;
/// use rs_conductor::hal::MockClock;
/// use rs_conductor::traits::Clock;
///
/// let clock = MockClock::at(9, 30);
/// let handle = clock.clone();
/// handle.set_hms(21, 0, 0);
/// assert_eq!(clock.time_of_day(), NaiveTime::from_hms_opt(21, 0, 0).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<NaiveTime>>,
}

impl MockClock {
    /// Creates a clock showing `time`.
    pub fn new(time: NaiveTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(time)),
        }
    }

    /// Creates a clock at `hour:minute:00`. Invalid values give midnight.
    pub fn at(hour: u32, minute: u32) -> Self {
        Self::new(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
    }

    /// Sets the time of day.
    pub fn set(&self, time: NaiveTime) {
        *lock(&self.now) = time;
    }

    /// Sets the time of day from components. Invalid values are ignored.
    pub fn set_hms(&self, hour: u32, minute: u32, second: u32) {
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, second) {
            self.set(time);
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::at(12, 0)
    }
}

impl Clock for MockClock {
    fn time_of_day(&self) -> NaiveTime {
        *lock(&self.now)
    }
}

// ============================================================================
// Media Mock
// ============================================================================

#[derive(Debug, Default)]
struct MediaState {
    upbeat: Vec<TrackRef>,
    tracks: Vec<TrackRef>,
    failing: HashSet<PathBuf>,
    played: Vec<TrackRef>,
    volumes: Vec<u8>,
    upbeat_picks: usize,
    track_picks: usize,
    stops: usize,
}

/// Mock media source for testing.
///
/// Picks are deterministic: tracks rotate in insertion order, skipping the
/// excluded track when another one exists.
#[derive(Debug, Clone, Default)]
pub struct MockMedia {
    state: Arc<Mutex<MediaState>>,
}

impl MockMedia {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    fn track(path: &str, secs: u64) -> TrackRef {
        TrackRef {
            path: PathBuf::from(path),
            duration: Duration::from_secs(secs.max(1)),
        }
    }

    /// Adds an intro track.
    pub fn with_upbeat(self, path: &str, secs: u64) -> Self {
        lock(&self.state).upbeat.push(Self::track(path, secs));
        self
    }

    /// Adds a playlist track.
    pub fn with_track(self, path: &str, secs: u64) -> Self {
        lock(&self.state).tracks.push(Self::track(path, secs));
        self
    }

    /// Makes `play` fail for this path.
    pub fn failing_play(self, path: &str) -> Self {
        lock(&self.state).failing.insert(PathBuf::from(path));
        self
    }

    /// Tracks successfully started, in order.
    pub fn played(&self) -> Vec<TrackRef> {
        lock(&self.state).played.clone()
    }

    /// File names of started tracks, in order.
    pub fn played_names(&self) -> Vec<String> {
        self.played().iter().map(|t| t.name().into_owned()).collect()
    }

    /// Volume levels set, in order.
    pub fn volumes(&self) -> Vec<u8> {
        lock(&self.state).volumes.clone()
    }

    /// Number of intro picks (one per show).
    pub fn upbeat_picks(&self) -> usize {
        lock(&self.state).upbeat_picks
    }

    /// Number of playlist picks.
    pub fn track_picks(&self) -> usize {
        lock(&self.state).track_picks
    }

    /// Number of `stop` calls.
    pub fn stops(&self) -> usize {
        lock(&self.state).stops
    }
}

impl MediaSource for MockMedia {
    fn list_tracks(&mut self) -> Result<Vec<TrackRef>, MediaError> {
        let state = lock(&self.state);
        Ok(state.upbeat.iter().chain(&state.tracks).cloned().collect())
    }

    fn pick_upbeat_track(&mut self) -> Result<TrackRef, MediaError> {
        let mut state = lock(&self.state);
        if state.upbeat.is_empty() {
            return Err(MediaError::NoTracks("upbeat"));
        }
        let track = state.upbeat[state.upbeat_picks % state.upbeat.len()].clone();
        state.upbeat_picks += 1;
        Ok(track)
    }

    fn pick_next_track(&mut self, exclude: Option<&TrackRef>) -> Result<TrackRef, MediaError> {
        let mut state = lock(&self.state);
        let len = state.tracks.len();
        if len == 0 {
            return Err(MediaError::NoTracks("playlist"));
        }
        let mut index = state.track_picks % len;
        if len > 1 && exclude == Some(&state.tracks[index]) {
            index = (index + 1) % len;
        }
        state.track_picks += 1;
        Ok(state.tracks[index].clone())
    }

    fn play(&mut self, track: &TrackRef) -> Result<Duration, MediaError> {
        let mut state = lock(&self.state);
        if state.failing.contains(&track.path) {
            return Err(MediaError::Player(format!("cannot open {}", track.name())));
        }
        state.played.push(track.clone());
        Ok(track.duration)
    }

    fn set_volume(&mut self, level: u8) -> Result<(), MediaError> {
        lock(&self.state).volumes.push(level);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        lock(&self.state).stops += 1;
        Ok(())
    }
}

// ============================================================================
// Alert Mock
// ============================================================================

/// Mock alert sink that stores messages.
#[derive(Debug, Clone, Default)]
pub struct MockAlerts {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MockAlerts {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts received so far.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl AlertSink for MockAlerts {
    fn send_alert(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}
