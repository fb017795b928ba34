//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `dry_run`: Logging actuator, log alert sink and the local wall clock
//! - `library`: Directory-backed media source (requires `library` feature)

pub mod dry_run;
pub mod mock;

#[cfg(feature = "library")]
pub mod library;

pub use dry_run::*;
pub use mock::*;

#[cfg(feature = "library")]
pub use library::LocalLibrary;
