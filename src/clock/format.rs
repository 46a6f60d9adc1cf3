//! Clock text rendering from strftime-style format strings.

use std::fmt::Write;

use chrono::NaiveDateTime;
use tracing::debug;

/// Fallback when the configured main format cannot render
pub const DEFAULT_TIME_FORMAT: &str = "%I:%M";

/// Fallback when the configured seconds format cannot render
pub const DEFAULT_SECONDS_FORMAT: &str = "%S";

/// Render both clock runs for an instant.
///
/// A format containing `%I` (12-hour) loses its leading zero, decided
/// independently per run. A format chrono cannot render falls back to
/// the default for that slot.
pub fn clock_texts(
    now: NaiveDateTime,
    time_format: &str,
    seconds_format: &str,
) -> (String, String) {
    (
        render(now, time_format, DEFAULT_TIME_FORMAT),
        render(now, seconds_format, DEFAULT_SECONDS_FORMAT),
    )
}

fn render(now: NaiveDateTime, format: &str, fallback: &str) -> String {
    match try_format(now, format) {
        Some(text) => strip_twelve_hour_zero(text, format),
        None => {
            debug!(format, "Unrenderable time format, using default");
            let text = try_format(now, fallback).unwrap_or_default();
            strip_twelve_hour_zero(text, fallback)
        }
    }
}

fn strip_twelve_hour_zero(text: String, format: &str) -> String {
    if format.contains("%I") {
        text.trim_start_matches('0').to_string()
    } else {
        text
    }
}

/// chrono reports unknown format specifiers through `fmt::Error`, so
/// rendering into a plain writer surfaces them without panicking.
fn try_format(now: NaiveDateTime, format: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", now.format(format)).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn test_twelve_hour_strips_leading_zero() {
        let (time, seconds) = clock_texts(at(14, 5, 9), "%I:%M", "%S");
        assert_eq!(time, "2:05");
        assert_eq!(seconds, "09");
    }

    #[test]
    fn test_twenty_four_hour_keeps_leading_zero() {
        let (time, _) = clock_texts(at(4, 5, 0), "%H:%M", "%S");
        assert_eq!(time, "04:05");
    }

    #[test]
    fn test_strip_applies_per_run() {
        let (time, seconds) = clock_texts(at(14, 5, 9), "%H:%M", "%I");
        assert_eq!(time, "14:05");
        assert_eq!(seconds, "2");
    }

    #[test]
    fn test_noon_and_midnight_render_as_twelve() {
        let (midnight, _) = clock_texts(at(0, 30, 0), "%I:%M", "%S");
        assert_eq!(midnight, "12:30");
        let (noon, _) = clock_texts(at(12, 0, 0), "%I:%M", "%S");
        assert_eq!(noon, "12:00");
    }

    #[test]
    fn test_single_digit_hour() {
        let (time, _) = clock_texts(at(9, 5, 0), "%I:%M", "%S");
        assert_eq!(time, "9:05");
    }

    #[test]
    fn test_unrenderable_format_falls_back() {
        let (time, seconds) = clock_texts(at(14, 5, 9), "%Q oops", "%Q");
        assert_eq!(time, "2:05");
        assert_eq!(seconds, "09");
    }

    #[test]
    fn test_literal_text_passes_through() {
        let (time, _) = clock_texts(at(14, 5, 9), "it is %H:%M", "%S");
        assert_eq!(time, "it is 14:05");
    }
}
