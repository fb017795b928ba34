//! Motor speed curves.
//!
//! [`SpeedProfile`] shapes the whole show: a logistic boot ramp added to a
//! mirrored logistic brake ramp gives a smooth ramp-up, plateau and
//! ramp-down without any phase branching. [`SpinDown`] is the short linear
//! full stop run at the very end of a show.
//!
//! # Example
//!
//! ```rust
//! use rs_conductor::{SpeedCurveParams, SpeedProfile};
//!
//! let profile = SpeedProfile::new(SpeedCurveParams::default()).unwrap();
//!
//! // 3 minute playlist
//! let start = profile.compute(0.0, 180.0);
//! let cruise = profile.compute(90.0, 180.0);
//! let end = profile.compute(180.0, 180.0);
//!
//! assert!(cruise > start);
//! assert!(cruise > end);
//! assert!((cruise - 50.0).abs() < 0.01); // max_speed
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Shortest duration the curve is evaluated over, in seconds.
///
/// Shorter playlists would squeeze the two ramps into each other.
pub const MIN_PROFILE_DURATION_SECS: f64 = 30.0;

/// Shape parameters for [`SpeedProfile`].
///
/// Speeds are duty-cycle percentages. The coefficients are the bases of the
/// two logistic curves: larger means a steeper ramp.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedCurveParams {
    /// Cruise duty cycle.
    pub max_speed: f64,
    /// Duty cycle at the start and end of the show.
    pub min_speed: f64,
    /// Base of the acceleration curve.
    pub boot_coefficient: f64,
    /// Base of the braking curve.
    pub break_coefficient: f64,
    /// Ramp offset above `min_speed` at the first and last instant.
    ///
    /// Half of `max_speed - min_speed` flattens the ramps entirely.
    pub transition_threshold: f64,
}

impl Default for SpeedCurveParams {
    fn default() -> Self {
        Self {
            max_speed: 50.0,
            min_speed: 10.0,
            boot_coefficient: 4.0,
            break_coefficient: 2.0,
            transition_threshold: 5.0,
        }
    }
}

impl SpeedCurveParams {
    /// Set the cruise and floor speeds.
    pub fn with_speeds(mut self, min_speed: f64, max_speed: f64) -> Self {
        self.min_speed = min_speed;
        self.max_speed = max_speed;
        self
    }

    /// Set both logistic bases.
    pub fn with_coefficients(mut self, boot: f64, brake: f64) -> Self {
        self.boot_coefficient = boot;
        self.break_coefficient = brake;
        self
    }

    /// Set the transition threshold.
    pub fn with_transition_threshold(mut self, threshold: f64) -> Self {
        self.transition_threshold = threshold;
        self
    }

    /// `max_speed - min_speed`.
    #[inline]
    pub fn span(&self) -> f64 {
        self.max_speed - self.min_speed
    }

    /// Check the parameter invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let out_of_range = |field, reason: &str| ConfigError::OutOfRange {
            field,
            reason: reason.to_string(),
        };

        if !(0.0..=100.0).contains(&self.min_speed) || !(0.0..=100.0).contains(&self.max_speed) {
            return Err(out_of_range("speed", "speeds must lie within 0..=100"));
        }
        if self.min_speed >= self.max_speed {
            return Err(out_of_range("speed", "min_speed must be below max_speed"));
        }
        if !(self.boot_coefficient > 1.0) {
            return Err(out_of_range("speed.boot_coefficient", "must be greater than 1"));
        }
        if !(self.break_coefficient > 1.0) {
            return Err(out_of_range("speed.break_coefficient", "must be greater than 1"));
        }
        if !(self.transition_threshold > 0.0 && self.transition_threshold < self.span()) {
            return Err(out_of_range(
                "speed.transition_threshold",
                "must lie strictly between 0 and max_speed - min_speed",
            ));
        }
        Ok(())
    }
}

/// Show-long duty-cycle curve.
///
/// Construct once from validated parameters; [`compute`](Self::compute) is
/// pure and can be called at any rate.
#[derive(Clone, Copy, Debug)]
pub struct SpeedProfile {
    params: SpeedCurveParams,
    boot_offset: f64,
    brake_offset: f64,
}

impl SpeedProfile {
    /// Build a profile, rejecting parameters that break the curve.
    pub fn new(params: SpeedCurveParams) -> Result<Self, ConfigError> {
        params.validate()?;

        // Shared logistic shape: each ramp sits exactly transition_threshold
        // away from its resting value at the show's first and last instant.
        let k = (params.span() / params.transition_threshold - 1.0).ln();

        Ok(Self {
            params,
            boot_offset: k / params.boot_coefficient.ln(),
            brake_offset: k / params.break_coefficient.ln(),
        })
    }

    /// Curve parameters.
    pub fn params(&self) -> &SpeedCurveParams {
        &self.params
    }

    /// Duty cycle in percent after `elapsed` seconds of a `duration`-second run.
    ///
    /// Negative `elapsed` is treated as 0 and `duration` is floored at
    /// [`MIN_PROFILE_DURATION_SECS`]. The result is clamped to `0..=100`.
    pub fn compute(&self, elapsed: f64, duration: f64) -> f64 {
        let p = &self.params;
        let span = p.span();
        let elapsed = elapsed.max(0.0);
        let duration = duration.max(MIN_PROFILE_DURATION_SECS);

        let boot = span / (1.0 + p.boot_coefficient.powf(-elapsed + self.boot_offset));
        let brake =
            span / (1.0 + p.break_coefficient.powf(elapsed + self.brake_offset - duration));

        (boot + brake - span + p.min_speed).clamp(0.0, 100.0)
    }

    /// [`compute`](Self::compute) with `Duration` arguments.
    pub fn at(&self, elapsed: Duration, duration: Duration) -> f64 {
        self.compute(elapsed.as_secs_f64(), duration.as_secs_f64())
    }
}

/// Linear full-stop schedule.
///
/// Starting from `from` percent, the duty cycle drops by `step` after each
/// delay of `total / from * step` until it reaches exactly 0.
///
/// ```rust
/// use std::time::Duration;
/// use rs_conductor::SpinDown;
///
/// let plan = SpinDown::new(50.0, Duration::from_secs(2), 1.0);
/// assert_eq!(plan.len(), 50);
/// assert_eq!(plan.step_delay(), Duration::from_millis(40));
///
/// let values: Vec<f32> = plan.iter().collect();
/// assert_eq!(values[0], 49.0);
/// assert_eq!(*values.last().unwrap(), 0.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinDown {
    from: f32,
    step: f32,
    step_delay: Duration,
}

impl SpinDown {
    /// Plan a stop from `from` percent over roughly `total`.
    ///
    /// A non-positive `step` is treated as 1.
    pub fn new(from: f32, total: Duration, step: f32) -> Self {
        let from = from.clamp(0.0, 100.0);
        let step = if step > 0.0 { step } else { 1.0 };
        let step_delay = if from > 0.0 {
            let nanos = total.as_nanos() as f64 * f64::from(step) / f64::from(from);
            Duration::from_nanos(nanos.round() as u64)
        } else {
            Duration::ZERO
        };
        Self {
            from,
            step,
            step_delay,
        }
    }

    /// Number of decrements until the motor is at 0.
    pub fn len(&self) -> usize {
        (self.from / self.step).ceil() as usize
    }

    /// Whether the motor is already stopped.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delay before each decrement.
    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Successive duty-cycle values, ending at 0.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (1..=self.len()).map(move |i| (self.from - i as f32 * self.step).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SpeedProfile {
        SpeedProfile::new(SpeedCurveParams::default()).unwrap()
    }

    // =========================================================================
    // Parameter validation
    // =========================================================================

    #[test]
    fn default_params_are_valid() {
        assert!(SpeedCurveParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_speeds() {
        let p = SpeedCurveParams::default().with_speeds(60.0, 50.0);
        assert!(p.validate().is_err());
        let p = SpeedCurveParams::default().with_speeds(50.0, 50.0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn rejects_speeds_outside_percent_range() {
        assert!(SpeedCurveParams::default()
            .with_speeds(-1.0, 50.0)
            .validate()
            .is_err());
        assert!(SpeedCurveParams::default()
            .with_speeds(10.0, 101.0)
            .validate()
            .is_err());
    }

    #[test]
    fn rejects_flat_coefficients() {
        assert!(SpeedCurveParams::default()
            .with_coefficients(1.0, 2.0)
            .validate()
            .is_err());
        assert!(SpeedCurveParams::default()
            .with_coefficients(4.0, 0.5)
            .validate()
            .is_err());
        assert!(SpeedCurveParams::default()
            .with_coefficients(f64::NAN, 2.0)
            .validate()
            .is_err());
    }

    #[test]
    fn rejects_threshold_outside_span() {
        for t in [0.0, -1.0, 40.0, 45.0] {
            let p = SpeedCurveParams::default().with_transition_threshold(t);
            assert!(p.validate().is_err(), "threshold {t}");
        }
    }

    // =========================================================================
    // Curve shape
    // =========================================================================

    #[test]
    fn endpoints_sit_one_threshold_above_min() {
        let p = profile();
        for duration in [30.0, 45.0, 180.0, 600.0] {
            let start = p.compute(0.0, duration);
            let end = p.compute(duration, duration);
            assert!((start - 15.0).abs() < 1e-6, "start {start} for {duration}");
            assert!((end - 15.0).abs() < 1e-6, "end {end} for {duration}");
        }
    }

    #[test]
    fn plateau_reaches_max_speed() {
        let p = profile();
        assert!((p.compute(90.0, 180.0) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn negative_elapsed_is_clamped() {
        let p = profile();
        assert_eq!(p.compute(-10.0, 120.0), p.compute(0.0, 120.0));
    }

    #[test]
    fn short_duration_uses_floor() {
        let p = profile();
        assert_eq!(p.compute(5.0, 10.0), p.compute(5.0, 30.0));
        assert_eq!(p.compute(5.0, -3.0), p.compute(5.0, 30.0));
    }

    #[test]
    fn long_after_end_settles_at_min() {
        let p = profile();
        let v = p.compute(500.0, 60.0);
        assert!((v - 10.0).abs() < 1e-3);
    }

    #[test]
    fn output_always_within_percent_range() {
        let p = SpeedProfile::new(
            SpeedCurveParams::default()
                .with_speeds(0.0, 100.0)
                .with_transition_threshold(1.0),
        )
        .unwrap();
        let mut t = -5.0;
        while t < 200.0 {
            let v = p.compute(t, 120.0);
            assert!((0.0..=100.0).contains(&v), "{v} at {t}");
            t += 0.25;
        }
    }

    #[test]
    fn monotonic_halves_with_symmetric_coefficients() {
        let p = SpeedProfile::new(SpeedCurveParams::default().with_coefficients(3.0, 3.0)).unwrap();
        let duration = 120.0;
        let mut prev = p.compute(0.0, duration);
        let mut t = 0.5;
        while t <= duration / 2.0 {
            let v = p.compute(t, duration);
            assert!(v + 1e-9 >= prev, "decreased at {t}: {prev} -> {v}");
            prev = v;
            t += 0.5;
        }
        while t <= duration {
            let v = p.compute(t, duration);
            assert!(v <= prev + 1e-9, "increased at {t}: {prev} -> {v}");
            prev = v;
            t += 0.5;
        }
    }

    #[test]
    fn duration_helper_matches_seconds() {
        let p = profile();
        assert_eq!(
            p.at(Duration::from_secs(10), Duration::from_secs(60)),
            p.compute(10.0, 60.0)
        );
    }

    // =========================================================================
    // Spin-down
    // =========================================================================

    #[test]
    fn spin_down_from_fifty() {
        let plan = SpinDown::new(50.0, Duration::from_secs(2), 1.0);
        assert_eq!(plan.len(), 50);
        let values: Vec<f32> = plan.iter().collect();
        assert_eq!(values.len(), 50);
        assert_eq!(values[0], 49.0);
        assert_eq!(values[48], 1.0);
        assert_eq!(values[49], 0.0);
        assert_eq!(plan.step_delay(), Duration::from_millis(40));
    }

    #[test]
    fn spin_down_fractional_start_ends_at_zero() {
        let plan = SpinDown::new(15.5, Duration::from_secs(2), 1.0);
        assert_eq!(plan.len(), 16);
        assert_eq!(plan.iter().last(), Some(0.0));
    }

    #[test]
    fn spin_down_from_zero_is_empty() {
        let plan = SpinDown::new(0.0, Duration::from_secs(2), 1.0);
        assert!(plan.is_empty());
        assert_eq!(plan.step_delay(), Duration::ZERO);
    }

    #[test]
    fn spin_down_bad_step_defaults_to_one() {
        let plan = SpinDown::new(10.0, Duration::from_secs(1), 0.0);
        assert_eq!(plan.len(), 10);
    }
}
