//! Business-hours window.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveTime;
//! use rs_conductor::ShopHours;
//!
//! let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
//!
//! // Late-night bar: wraps past midnight
//! let hours = ShopHours::new(t(22, 0), t(6, 0));
//! assert!(hours.is_open(t(23, 0)));
//! assert!(hours.is_open(t(5, 0)));
//! assert!(!hours.is_open(t(12, 0)));
//! ```

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::parsing::time_of_day;

/// Daily interval during which shows may run.
///
/// Both ends are inclusive. When `open` is later than `close` the window
/// spans midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopHours {
    /// Opening time.
    #[serde(with = "time_of_day")]
    pub open: NaiveTime,
    /// Closing time.
    #[serde(with = "time_of_day")]
    pub close: NaiveTime,
}

impl Default for ShopHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl ShopHours {
    /// Create a window from opening and closing times.
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    /// Whether the window wraps past midnight.
    #[inline]
    pub fn wraps_midnight(&self) -> bool {
        self.open > self.close
    }

    /// Whether `now` falls inside the window.
    pub fn is_open(&self, now: NaiveTime) -> bool {
        if self.wraps_midnight() {
            now >= self.open || now <= self.close
        } else {
            self.open <= now && now <= self.close
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn default_is_eight_to_eight() {
        let hours = ShopHours::default();
        assert_eq!(hours.open, hms(8, 0, 0));
        assert_eq!(hours.close, hms(20, 0, 0));
        assert!(!hours.wraps_midnight());
    }

    #[test]
    fn regular_window_boundaries() {
        let hours = ShopHours::new(hms(8, 0, 0), hms(20, 0, 0));
        assert!(hours.is_open(hms(8, 0, 0)));
        assert!(hours.is_open(hms(19, 59, 59)));
        assert!(hours.is_open(hms(20, 0, 0)));
        assert!(!hours.is_open(hms(7, 59, 59)));
        assert!(!hours.is_open(hms(20, 0, 1)));
    }

    #[test]
    fn wrapping_window() {
        let hours = ShopHours::new(hms(22, 0, 0), hms(6, 0, 0));
        assert!(hours.wraps_midnight());
        assert!(hours.is_open(hms(23, 0, 0)));
        assert!(hours.is_open(hms(0, 0, 0)));
        assert!(hours.is_open(hms(5, 0, 0)));
        assert!(hours.is_open(hms(22, 0, 0)));
        assert!(hours.is_open(hms(6, 0, 0)));
        assert!(!hours.is_open(hms(12, 0, 0)));
        assert!(!hours.is_open(hms(21, 59, 59)));
        assert!(!hours.is_open(hms(6, 0, 1)));
    }

    #[test]
    fn zero_length_window_is_single_instant() {
        let hours = ShopHours::new(hms(12, 0, 0), hms(12, 0, 0));
        assert!(hours.is_open(hms(12, 0, 0)));
        assert!(!hours.is_open(hms(12, 0, 1)));
    }
}
