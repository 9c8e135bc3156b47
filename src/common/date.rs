//! Serial-day date arithmetic.
//!
//! Spreadsheet dates are a decimal count of days since a workbook epoch.
//! The 1900 system counts serial 1 as 1900-01-01 and keeps the phantom
//! 1900-02-29 (serial 60), so from serial 61 on it counts from 1899-12-30.
//! The 1904 system counts from 1904-01-01.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// First serial after the phantom 1900-02-29.
const FIRST_SERIAL_AFTER_LEAP_BUG: f64 = 61.0;

fn epoch(use_1904_windowing: bool) -> NaiveDateTime {
    let date = if use_1904_windowing {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    };
    // Both epochs are valid calendar dates
    date.unwrap_or_default().and_time(NaiveTime::MIN)
}

/// Convert a serial day number to a date-time, rounded to the millisecond.
pub fn serial_to_datetime(serial: f64, use_1904_windowing: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let mut millis = (serial * MILLIS_PER_DAY).round() as i64;
    // Serial 60 has no real date; like Excel readers it lands on 1900-03-01
    if !use_1904_windowing && serial.floor() < FIRST_SERIAL_AFTER_LEAP_BUG {
        millis += MILLIS_PER_DAY as i64;
    }
    epoch(use_1904_windowing).checked_add_signed(Duration::milliseconds(millis))
}

/// Convert a date-time to a serial day number.
pub fn datetime_to_serial(value: &NaiveDateTime, use_1904_windowing: bool) -> f64 {
    let truncated = value
        .with_nanosecond(value.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(*value);
    let delta = truncated - epoch(use_1904_windowing);
    let serial = delta.num_milliseconds() as f64 / MILLIS_PER_DAY;
    if !use_1904_windowing && serial < FIRST_SERIAL_AFTER_LEAP_BUG {
        serial - 1.0
    } else {
        serial
    }
}

/// Translate a spreadsheet/Java style date pattern (`yyyy-MM-dd HH:mm:ss`)
/// to a chrono format string.
pub fn to_chrono_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        match c {
            'y' | 'Y' => out.push_str(if run <= 2 { "%y" } else { "%Y" }),
            'M' => out.push_str(match run {
                1 => "%-m",
                2 => "%m",
                3 => "%b",
                _ => "%B",
            }),
            'd' | 'D' => out.push_str(if run == 1 { "%-d" } else { "%d" }),
            'H' => out.push_str(if run == 1 { "%-H" } else { "%H" }),
            'h' => out.push_str(if run == 1 { "%-I" } else { "%I" }),
            'm' => out.push_str(if run == 1 { "%-M" } else { "%M" }),
            's' => out.push_str(if run == 1 { "%-S" } else { "%S" }),
            'S' => out.push_str("%3f"),
            'a' => out.push_str("%p"),
            '%' => {
                for _ in 0..run {
                    out.push_str("%%");
                }
            },
            '\'' => {
                // Quoted literal text
                let mut j = i + 1;
                while j < chars.len() && chars[j] != '\'' {
                    out.push(chars[j]);
                    j += 1;
                }
                i = j + 1;
                continue;
            },
            other => {
                for _ in 0..run {
                    out.push(other);
                }
            },
        }
        i += run;
    }
    out
}

/// Format a date-time with a spreadsheet/Java style pattern.
pub fn format_datetime(value: &NaiveDateTime, pattern: &str) -> String {
    value.format(&to_chrono_pattern(pattern)).to_string()
}

/// Parse a date-time with a spreadsheet/Java style pattern; date-only
/// patterns yield midnight.
pub fn parse_datetime(text: &str, pattern: &str) -> Option<NaiveDateTime> {
    let chrono_pattern = to_chrono_pattern(pattern);
    NaiveDateTime::parse_from_str(text, &chrono_pattern)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, &chrono_pattern)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_serial_1900_system() {
        assert_eq!(serial_to_datetime(61.0, false), Some(dt(1900, 3, 1, 0, 0, 0)));
        assert_eq!(
            serial_to_datetime(45000.5, false),
            Some(dt(2023, 3, 15, 12, 0, 0))
        );
        assert_eq!(datetime_to_serial(&dt(2023, 3, 15, 12, 0, 0), false), 45000.5);
    }

    #[test]
    fn test_serials_before_march_1900() {
        assert_eq!(serial_to_datetime(1.0, false), Some(dt(1900, 1, 1, 0, 0, 0)));
        assert_eq!(serial_to_datetime(59.25, false), Some(dt(1900, 2, 28, 6, 0, 0)));
        assert_eq!(serial_to_datetime(60.0, false), Some(dt(1900, 3, 1, 0, 0, 0)));
        assert_eq!(serial_to_datetime(0.5, false), Some(dt(1899, 12, 31, 12, 0, 0)));
        assert_eq!(datetime_to_serial(&dt(1900, 1, 1, 0, 0, 0), false), 1.0);
        assert_eq!(datetime_to_serial(&dt(1900, 2, 28, 6, 0, 0), false), 59.25);
        assert_eq!(datetime_to_serial(&dt(1900, 3, 1, 0, 0, 0), false), 61.0);
    }

    #[test]
    fn test_serial_1904_system_shift() {
        let value = dt(2023, 3, 15, 0, 0, 0);
        let s1900 = datetime_to_serial(&value, false);
        let s1904 = datetime_to_serial(&value, true);
        assert_eq!(s1900 - s1904, 1462.0);
        assert_eq!(serial_to_datetime(s1904, true), Some(value));
    }

    #[test]
    fn test_negative_serial_rejected() {
        assert_eq!(serial_to_datetime(-1.0, false), None);
        assert_eq!(serial_to_datetime(f64::NAN, false), None);
    }

    #[test]
    fn test_pattern_translation() {
        assert_eq!(to_chrono_pattern("yyyy-MM-dd HH:mm:ss"), "%Y-%m-%d %H:%M:%S");
        assert_eq!(to_chrono_pattern("yyyy'T'MM"), "%YT%m");
        let value = dt(2024, 1, 5, 7, 8, 9);
        assert_eq!(format_datetime(&value, "yyyy/MM/dd"), "2024/01/05");
        assert_eq!(parse_datetime("2024/01/05", "yyyy/MM/dd"), Some(dt(2024, 1, 5, 0, 0, 0)));
        assert_eq!(
            parse_datetime("2024-01-05 07:08:09", "yyyy-MM-dd HH:mm:ss"),
            Some(value)
        );
    }
}
