//! # rs-conductor
//!
//! Show scheduler and motor choreography for a music-synchronized model
//! train display that runs during shop hours.
//!
//! ## Features
//!
//! - **Business hours**: Shows only start while the shop is open, with
//!   midnight-wrapping windows
//! - **Smooth motion**: A double-logistic speed curve stretched over the
//!   playlist's total run time, then a linear spin-down to a full stop
//! - **Presence check**: A track sensor confirms the train is still moving
//!   after the music ends; a late train raises an alert
//! - **One show at a time**: A single shared state with a cooldown between
//!   shows
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Actuator, media, alert and clock abstractions
//! - `speed_profile` - Speed curve and spin-down schedule
//! - `presence` - Sensor event channel and deadline checks
//! - `state` - Shared show state and actuator
//! - `sequencer` - One complete show
//! - `scheduler` - Always-on control loop
//! - `hal` - Concrete implementations (mock for testing, dry run, media library)
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use rs_conductor::{ShopHours, SpeedCurveParams, SpeedProfile};
//! use chrono::NaiveTime;
//!
//! let hours = ShopHours::default();
//! assert!(hours.is_open(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
//!
//! let profile = SpeedProfile::new(SpeedCurveParams::default()).unwrap();
//! let cruising = profile.at(Duration::from_secs(60), Duration::from_secs(120));
//! assert!((cruising - 50.0).abs() < 0.5);
//! ```

#![warn(missing_docs)]

/// Configuration file and command-line settings.
pub mod config;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Business-hours window.
pub mod hours;
/// Time-of-day and flag parsing helpers.
pub mod parsing;
/// Train presence sensor handling.
pub mod presence;
/// Always-on control loop.
pub mod scheduler;
/// One complete show.
pub mod sequencer;
/// Speed curve and spin-down schedule.
pub mod speed_profile;
/// Shared show state and actuator.
pub mod state;
/// Core traits for outputs, media, alerts and time.
pub mod traits;

// Re-exports for convenience
pub use config::{ConductorConfig, MediaConfig, PresenceConfig, SchedulerConfig, ShowConfig};
pub use error::{ConductorError, ConfigError, MediaError};
pub use hours::ShopHours;
pub use presence::{
    presence_channel, DeadlineOutcome, PresenceMonitor, PresenceReceiver, PresenceSender, Sighting,
};
pub use scheduler::{Scheduler, TickReport};
pub use sequencer::{PlannedSlot, ShowSequencer};
pub use speed_profile::{SpeedCurveParams, SpeedProfile, SpinDown};
pub use state::{
    SharedActuator, SharedShowState, ShowId, ShowPhase, ShowResult, ShowState, StateLabel,
};
pub use traits::{Actuator, AlertSink, Clock, MediaSource, TrackRef};
