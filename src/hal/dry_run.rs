//! Desktop implementations that log instead of driving hardware.
//!
//! Used by the `conductor` binary when no GPIO backend is wired in, and
//! handy when rehearsing a schedule on a laptop.

use chrono::{Local, NaiveTime};
use tracing::{debug, error, info};

use crate::traits::{Actuator, AlertSink, Clock};

/// Actuator that logs output changes.
///
/// Duty-cycle writes are frequent (one per ramp tick) and go to `debug`;
/// relay changes go to `info`, and only when the level actually changes.
#[derive(Debug, Default)]
pub struct LoggingActuator {
    enabled: bool,
    open_signal: bool,
    duty_cycle: f32,
}

impl LoggingActuator {
    /// Creates an actuator with all outputs low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last commanded duty cycle.
    pub fn duty_cycle(&self) -> f32 {
        self.duty_cycle
    }
}

impl Actuator for LoggingActuator {
    type Error = core::convert::Infallible;

    fn set_enable(&mut self, on: bool) -> Result<(), Self::Error> {
        if on != self.enabled {
            info!(on, "motor enable");
        }
        self.enabled = on;
        Ok(())
    }

    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), Self::Error> {
        let percent = percent.clamp(0.0, 100.0);
        debug!(percent, "motor duty cycle");
        self.duty_cycle = percent;
        Ok(())
    }

    fn set_open_signal(&mut self, on: bool) -> Result<(), Self::Error> {
        if on != self.open_signal {
            info!(on, "open signal");
        }
        self.open_signal = on;
        Ok(())
    }
}

/// Alert sink that writes `ALERT: ...` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send_alert(&self, message: &str) {
        error!("ALERT: {message}");
    }
}

/// Local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_actuator_clamps_duty() {
        let mut actuator = LoggingActuator::new();
        actuator.set_duty_cycle(150.0).unwrap();
        assert_eq!(actuator.duty_cycle(), 100.0);
        actuator.shutdown().unwrap();
        assert_eq!(actuator.duty_cycle(), 0.0);
    }
}
