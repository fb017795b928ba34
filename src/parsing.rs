//! Parsing helpers for configuration values.
//!
//! These accept the loose formats an installer types into an environment
//! file: `8:00`, `08:00:00`, `1`, `off`.

use chrono::NaiveTime;

use crate::error::ConfigError;

/// Parse a time of day in `HH:MM:SS` or `HH:MM` form.
///
/// Surrounding whitespace is ignored. Returns `None` for anything else,
/// including out-of-range hours like `24:00`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use rs_conductor::parsing::parse_time_of_day;
///
/// assert_eq!(parse_time_of_day("08:00:00"), NaiveTime::from_hms_opt(8, 0, 0));
/// assert_eq!(parse_time_of_day(" 20:30 "), NaiveTime::from_hms_opt(20, 30, 0));
/// assert_eq!(parse_time_of_day("24:00"), None);
/// ```
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Parse the time of day held by configuration key `field`.
///
/// # Examples
///
/// ```
/// use rs_conductor::parsing::parse_time_field;
/// use rs_conductor::ConfigError;
///
/// assert!(parse_time_field("OPEN_HOUR", "08:00").is_ok());
/// assert!(matches!(
///     parse_time_field("OPEN_HOUR", "8am"),
///     Err(ConfigError::InvalidTime { field: "OPEN_HOUR", .. })
/// ));
/// ```
pub fn parse_time_field(field: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    parse_time_of_day(value).ok_or_else(|| ConfigError::InvalidTime {
        field,
        value: value.trim().to_string(),
    })
}

/// Parse an on/off flag.
///
/// Accepts `1/0`, `true/false`, `yes/no`, `on/off`, case-insensitive.
///
/// # Examples
///
/// ```
/// use rs_conductor::parsing::parse_flag;
///
/// assert_eq!(parse_flag("1"), Some(true));
/// assert_eq!(parse_flag("Off"), Some(false));
/// assert_eq!(parse_flag("maybe"), None);
/// ```
pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `clap` value parser wrapper around [`parse_flag`].
pub fn flag_arg(s: &str) -> Result<bool, String> {
    parse_flag(s).ok_or_else(|| format!("'{s}' is not an on/off value"))
}

/// Serde adapter storing a [`NaiveTime`] as `"HH:MM:SS"`.
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as `HH:MM:SS`.
    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M:%S"))
    }

    /// Deserialize from `HH:MM` or `HH:MM:SS`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_field("hours", &raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    // =========================================================================
    // parse_time_of_day tests
    // =========================================================================

    #[test]
    fn time_with_seconds() {
        assert_eq!(parse_time_of_day("08:00:00"), Some(hms(8, 0, 0)));
        assert_eq!(parse_time_of_day("19:59:59"), Some(hms(19, 59, 59)));
    }

    #[test]
    fn time_without_seconds() {
        assert_eq!(parse_time_of_day("22:00"), Some(hms(22, 0, 0)));
        assert_eq!(parse_time_of_day("6:05"), Some(hms(6, 5, 0)));
    }

    #[test]
    fn time_whitespace() {
        assert_eq!(parse_time_of_day("  08:00:00\n"), Some(hms(8, 0, 0)));
    }

    #[test]
    fn time_invalid() {
        assert_eq!(parse_time_of_day(""), None);
        assert_eq!(parse_time_of_day("8"), None);
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("12:60"), None);
        assert_eq!(parse_time_of_day("noon"), None);
    }

    // =========================================================================
    // parse_flag tests
    // =========================================================================

    #[test]
    fn flag_true_spellings() {
        for s in ["1", "true", "TRUE", "yes", "on", " On "] {
            assert_eq!(parse_flag(s), Some(true), "{s}");
        }
    }

    #[test]
    fn flag_false_spellings() {
        for s in ["0", "false", "No", "off"] {
            assert_eq!(parse_flag(s), Some(false), "{s}");
        }
    }

    #[test]
    fn flag_invalid() {
        assert_eq!(parse_flag(""), None);
        assert_eq!(parse_flag("2"), None);
    }

    #[test]
    fn time_field_names_key_and_input() {
        let err = parse_time_field("CLOSE_HOUR", " 25:00 ").unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::InvalidTime { field: "CLOSE_HOUR", value } if value == "25:00"
        ));
        assert!(err.to_string().contains("CLOSE_HOUR"));
        assert_eq!(parse_time_field("CLOSE_HOUR", "20:00").unwrap(), hms(20, 0, 0));
    }

    #[test]
    fn flag_wrapper_reports_input() {
        assert_eq!(flag_arg("yes"), Ok(true));
        assert!(flag_arg("maybe").unwrap_err().contains("maybe"));
    }
}
