//! Number formats: built-in format indices, date-pattern detection and a
//! small formatter/parser for numeric patterns.
//!
//! Only the subset of the format language needed to bridge values is
//! implemented: fixed decimals, grouping, percent and scientific notation.
//! Date-like patterns are routed to [`crate::common::date`].

use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};

/// Index of the `General` format.
pub const GENERAL_INDEX: u16 = 0;

/// Pattern applied to dates written without an explicit format.
pub const DEFAULT_DATE_PATTERN: &str = "yyyy-MM-dd HH:mm:ss";

/// Pattern applied to date-only values written without an explicit format.
pub const DEFAULT_LOCAL_DATE_PATTERN: &str = "yyyy-MM-dd";

/// Format patterns predefined by the workbook formats (ECMA-376 18.8.30).
pub static BUILTIN_FORMATS: Map<u16, &'static str> = phf_map! {
    0u16 => "General",
    1u16 => "0",
    2u16 => "0.00",
    3u16 => "#,##0",
    4u16 => "#,##0.00",
    5u16 => "\"$\"#,##0_);(\"$\"#,##0)",
    6u16 => "\"$\"#,##0_);[Red](\"$\"#,##0)",
    7u16 => "\"$\"#,##0.00_);(\"$\"#,##0.00)",
    8u16 => "\"$\"#,##0.00_);[Red](\"$\"#,##0.00)",
    9u16 => "0%",
    10u16 => "0.00%",
    11u16 => "0.00E+00",
    12u16 => "# ?/?",
    13u16 => "# ??/??",
    14u16 => "m/d/yy",
    15u16 => "d-mmm-yy",
    16u16 => "d-mmm",
    17u16 => "mmm-yy",
    18u16 => "h:mm AM/PM",
    19u16 => "h:mm:ss AM/PM",
    20u16 => "h:mm",
    21u16 => "h:mm:ss",
    22u16 => "m/d/yy h:mm",
    37u16 => "#,##0_);(#,##0)",
    38u16 => "#,##0_);[Red](#,##0)",
    39u16 => "#,##0.00_);(#,##0.00)",
    40u16 => "#,##0.00_);[Red](#,##0.00)",
    41u16 => "_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)",
    42u16 => "_(\"$\"* #,##0_);_(\"$\"* (#,##0);_(\"$\"* \"-\"_);_(@_)",
    43u16 => "_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)",
    44u16 => "_(\"$\"* #,##0.00_);_(\"$\"* (#,##0.00);_(\"$\"* \"-\"??_);_(@_)",
    45u16 => "mm:ss",
    46u16 => "[h]:mm:ss",
    47u16 => "mm:ss.0",
    48u16 => "##0.0E+0",
    49u16 => "@",
};

/// Look up the pattern of a built-in format index.
pub fn builtin_format(index: u16) -> Option<&'static str> {
    BUILTIN_FORMATS.get(&index).copied()
}

/// Reverse lookup of a built-in pattern.
pub fn builtin_index(pattern: &str) -> Option<u16> {
    BUILTIN_FORMATS
        .entries()
        .find(|(_, p)| **p == pattern)
        .map(|(i, _)| *i)
}

/// Whether a format describes a date or time.
///
/// Built-in date indices are recognized directly; custom patterns are scanned
/// for date/time tokens outside quoted literals and bracketed sections.
pub fn is_date_format(index: u16, pattern: Option<&str>) -> bool {
    match index {
        14..=22 | 27..=36 | 45..=47 | 50..=58 => return true,
        0..=13 | 37..=44 | 48 | 49 => return false,
        _ => {},
    }
    pattern.is_some_and(is_date_pattern)
}

/// Scan a custom pattern for date/time tokens.
pub fn is_date_pattern(pattern: &str) -> bool {
    if pattern.eq_ignore_ascii_case("general") || pattern == "@" {
        return false;
    }
    // Only the positive section decides
    let section = pattern.split(';').next().unwrap_or(pattern);
    let mut in_quotes = false;
    let mut chars = section.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' | '_' | '*' => {
                chars.next();
            },
            '[' if !in_quotes => {
                // Elapsed-time markers such as [h] still denote time
                let mut inner = String::new();
                for n in chars.by_ref() {
                    if n == ']' {
                        break;
                    }
                    inner.push(n);
                }
                let lower = inner.to_ascii_lowercase();
                if !lower.is_empty() && lower.chars().all(|x| matches!(x, 'h' | 'm' | 's')) {
                    return true;
                }
            },
            _ if in_quotes => {},
            'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' | 'm' | 'M' => return true,
            _ => {},
        }
    }
    false
}

/// Decimal and grouping separators used when formatting and parsing numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberLocale {
    pub decimal_separator: char,
    pub grouping_separator: char,
}

impl NumberLocale {
    pub const US: NumberLocale = NumberLocale {
        decimal_separator: '.',
        grouping_separator: ',',
    };
    pub const GERMAN: NumberLocale = NumberLocale {
        decimal_separator: ',',
        grouping_separator: '.',
    };
    pub const FRENCH: NumberLocale = NumberLocale {
        decimal_separator: ',',
        grouping_separator: '\u{a0}',
    };
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self::US
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct NumericPattern {
    decimals: usize,
    grouping: bool,
    percent: bool,
    scientific: bool,
}

fn analyze_pattern(pattern: &str) -> NumericPattern {
    let section = pattern.split(';').next().unwrap_or(pattern);
    let mut shape = NumericPattern::default();
    let mut in_quotes = false;
    let mut after_point = false;
    for c in section.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {},
            '.' => after_point = true,
            ',' if !after_point => shape.grouping = true,
            '%' => shape.percent = true,
            'E' | 'e' => shape.scientific = true,
            '0' | '#' | '?' if after_point && !shape.scientific => shape.decimals += 1,
            _ => {},
        }
    }
    shape
}

/// Render a number the way the `General` format does: shortest round-trip
/// representation, no trailing `.0`, plain notation for ordinary magnitudes.
pub fn format_general(value: f64, locale: &NumberLocale) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        return itoa::Buffer::new().format(value as i64).to_string();
    }
    let mut buffer = ryu::Buffer::new();
    let text = buffer.format(value);
    let text = text.strip_suffix(".0").unwrap_or(text);
    if locale.decimal_separator == '.' {
        text.to_string()
    } else {
        text.replace('.', &locale.decimal_separator.to_string())
    }
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

/// Format a number with a numeric pattern such as `#,##0.00` or `0.0%`.
/// Unknown or `General` patterns fall back to [`format_general`].
pub fn format_number(value: f64, pattern: Option<&str>, locale: &NumberLocale) -> String {
    let pattern = match pattern {
        Some(p) if !p.eq_ignore_ascii_case("general") && p != "@" => p,
        _ => return format_general(value, locale),
    };
    let shape = analyze_pattern(pattern);
    if shape.scientific {
        let text = format!("{:.*E}", shape.decimals, value);
        return text.replace('.', &locale.decimal_separator.to_string());
    }

    let scaled = if shape.percent { value * 100.0 } else { value };
    let fixed = format!("{:.*}", shape.decimals, scaled.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed.clone(), None),
    };

    let mut out = String::with_capacity(fixed.len() + 4);
    if scaled < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    if shape.grouping {
        out.push_str(&group_digits(&int_part, locale.grouping_separator));
    } else {
        out.push_str(&int_part);
    }
    if let Some(frac) = frac_part {
        out.push(locale.decimal_separator);
        out.push_str(&frac);
    }
    if shape.percent {
        out.push('%');
    }
    out
}

/// Parse text into a number honoring the locale separators, a trailing
/// percent sign and an optional numeric pattern.
pub fn parse_number(text: &str, pattern: Option<&str>, locale: &NumberLocale) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (body, percent) = match trimmed.strip_suffix('%') {
        Some(body) => (body.trim_end(), true),
        None => (trimmed, pattern.is_some_and(|p| analyze_pattern(p).percent)),
    };

    let mut normalized = String::with_capacity(body.len());
    for c in body.chars() {
        if c == locale.grouping_separator || (c == ' ' && locale.grouping_separator == '\u{a0}') {
            continue;
        }
        if c == locale.decimal_separator {
            normalized.push('.');
        } else {
            normalized.push(c);
        }
    }

    let value: f64 = fast_float2::parse(normalized.as_bytes()).ok()?;
    Some(if percent { value / 100.0 } else { value })
}
