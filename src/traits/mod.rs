//! Trait definitions for the collaborators the conductor drives.
//!
//! This module defines the abstractions that let the show logic run against
//! real outputs, a dry-run logger, or test mocks.
//!
//! # Submodules
//!
//! - `hardware`: Motor/relay outputs and the wall clock
//! - `media`: Track selection and playback
//! - `alert`: Operator alerts
//!
//! # Key Traits
//!
//! - [`Actuator`]: Motor duty cycle, motor enable, shop-open line
//! - [`Clock`]: Time of day for business hours
//! - [`MediaSource`]: Intro and playlist tracks with durations
//! - [`AlertSink`]: Fire-and-forget alerts

pub mod alert;
pub mod hardware;
pub mod media;

pub use alert::*;
pub use hardware::*;
pub use media::*;
