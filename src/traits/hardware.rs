//! Hardware abstraction traits for the motor outputs and the wall clock.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Actuator`] | Motor PWM, motor-enable relay and the "shop open" line |
//! | [`Clock`] | Local time of day for business-hours checks |
//!
//! For tests and desktop development use the mocks in [`crate::hal::mock`],
//! or [`crate::hal::dry_run`] to log output changes instead of driving pins.
//!
//! # Example
//!
//! ```rust
//! use rs_conductor::traits::Actuator;
//! use rs_conductor::hal::MockActuator;
//!
//! let mut actuator = MockActuator::new();
//! actuator.set_enable(true).unwrap();
//! actuator.set_duty_cycle(42.0).unwrap();
//!
//! actuator.shutdown().unwrap();
//! assert_eq!(actuator.duty_cycle, 0.0);
//! assert!(!actuator.enabled);
//! assert!(!actuator.open_signal);
//! ```

use chrono::NaiveTime;

/// Open-loop motor and relay outputs.
///
/// There is no feedback path: the conductor only ever commands values and
/// never reads them back.
///
/// # Implementation Notes
///
/// - `set_duty_cycle` receives a percentage; clamp to `0.0..=100.0` before
///   writing the PWM register
/// - `set_open_signal` drives the solid-state relay for ambient lighting
/// - Errors are reported through the associated `Error` type; the conductor
///   treats them as fatal during setup and best-effort during a show
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_conductor::traits::Actuator;
///
/// struct PiOutputs { /* gpio handles */ }
///
/// impl Actuator for PiOutputs {
///     type Error = std::io::Error;
///
///     fn set_enable(&mut self, on: bool) -> Result<(), Self::Error> {
///         // write motor-enable pin
///         Ok(())
///     }
///
///     fn set_duty_cycle(&mut self, percent: f32) -> Result<(), Self::Error> {
///         let duty = percent.clamp(0.0, 100.0);
///         // write PWM
///         Ok(())
///     }
///
///     fn set_open_signal(&mut self, on: bool) -> Result<(), Self::Error> {
///         // write SSR pin
///         Ok(())
///     }
/// }
/// ```
pub trait Actuator {
    /// Error type for output operations.
    type Error: core::fmt::Debug;

    /// Switch the motor-enable relay.
    fn set_enable(&mut self, on: bool) -> Result<(), Self::Error>;

    /// Set motor drive power as a percentage (0 to 100).
    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), Self::Error>;

    /// Drive the "shop open" line (ambient lighting, SSR).
    fn set_open_signal(&mut self, on: bool) -> Result<(), Self::Error>;

    /// Force every output low.
    ///
    /// All three writes are attempted even if an earlier one fails; the
    /// first error is returned.
    fn shutdown(&mut self) -> Result<(), Self::Error> {
        let duty = self.set_duty_cycle(0.0);
        let enable = self.set_enable(false);
        let open = self.set_open_signal(false);
        duty.and(enable).and(open)
    }
}

/// Local wall-clock time source.
///
/// Only the time of day matters; all durations inside a show use the
/// monotonic `tokio::time::Instant` instead.
pub trait Clock {
    /// Current local time of day.
    fn time_of_day(&self) -> NaiveTime;
}
