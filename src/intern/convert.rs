// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Canonical string renderings for the interned value shapes.

use chrono::{DateTime, Utc};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Render `value` in `base` (2..=36), lowercase digits, leading `-` for
/// negatives.
///
/// # Panics
///
/// Panics if `base` is outside 2..=36.
pub(crate) fn format_int(value: i64, base: u32) -> String {
    assert!((2..=36).contains(&base), "int base {base} out of range 2..=36");

    // Accumulate on the unsigned magnitude so i64::MIN needs no special
    // case.
    let mut magnitude = value.unsigned_abs();
    let mut buf = [0u8; 65];
    let mut at = buf.len();
    loop {
        at -= 1;
        buf[at] = DIGITS[(magnitude % u64::from(base)) as usize];
        magnitude /= u64::from(base);
        if magnitude == 0 {
            break;
        }
    }
    if value < 0 {
        at -= 1;
        buf[at] = b'-';
    }
    // Digits and '-' are ASCII.
    String::from_utf8_lossy(&buf[at..]).into_owned()
}

/// Shortest round-trip rendering of `value`. Callers short-circuit NaN
/// before the cache, so the rendering itself stays total.
pub(crate) fn format_float(value: f64) -> String {
    format!("{value}")
}

/// Identity of a timestamp: nanoseconds since the epoch where
/// representable, else the millisecond fallback for the far past/future.
pub(crate) fn time_identity(value: DateTime<Utc>) -> u64 {
    value
        .timestamp_nanos_opt()
        .unwrap_or_else(|| value.timestamp_millis()) as u64
}

/// Render a timestamp through a strftime layout.
pub(crate) fn format_time(value: DateTime<Utc>, layout: &str) -> String {
    value.format(layout).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_int_base_10() {
        assert_eq!(format_int(0, 10), "0");
        assert_eq!(format_int(42, 10), "42");
        assert_eq!(format_int(-42, 10), "-42");
        assert_eq!(format_int(i64::MAX, 10), "9223372036854775807");
        assert_eq!(format_int(i64::MIN, 10), "-9223372036854775808");
    }

    #[test]
    fn test_format_int_other_bases() {
        assert_eq!(format_int(255, 16), "ff");
        assert_eq!(format_int(-255, 16), "-ff");
        assert_eq!(format_int(5, 2), "101");
        assert_eq!(format_int(35, 36), "z");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_format_int_bad_base_panics() {
        let _ = format_int(1, 1);
    }

    #[test]
    fn test_format_float_shortest() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_time_rendering_and_identity() {
        let t = Utc.with_ymd_and_hms(2024, 7, 1, 12, 30, 45).unwrap();
        assert_eq!(format_time(t, "%Y-%m-%d %H:%M:%S"), "2024-07-01 12:30:45");
        assert_eq!(time_identity(t), time_identity(t));
        let later = t + chrono::Duration::nanoseconds(1);
        assert_ne!(time_identity(t), time_identity(later));
    }
}
