//! Resolvers that turn compact query values into absolute ones.
//!
//! - `7d`, `2m`, `1y` → a timestamp that many calendar units before "now"
//! - `10K`, `5M`, `1G` → a byte count (binary multiples)
//! - `2024-01-15`, `2024/01/15` → midnight UTC of that day
//!
//! All functions are pure given their inputs and return `None` for values
//! that do not match the expected shape.

use chrono::{DateTime, Days, Months, NaiveDate, TimeZone, Utc};

/// Calendar unit of a relative duration token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Day,
    Month,
    Year,
}

impl DurationUnit {
    fn from_suffix(suffix: char) -> Option<Self> {
        match suffix.to_ascii_lowercase() {
            'd' => Some(Self::Day),
            'm' => Some(Self::Month),
            'y' => Some(Self::Year),
            _ => None,
        }
    }
}

/// Split `<digits><suffix>` into its numeric part and trailing suffix.
fn split_amount(token: &str) -> Option<(u64, &str)> {
    let digits_end = token
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(token.len(), |(idx, _)| idx);
    if digits_end == 0 {
        return None;
    }
    let amount = token[..digits_end].parse::<u64>().ok()?;
    Some((amount, &token[digits_end..]))
}

/// Parse a relative duration token such as `7d` into its amount and unit.
pub fn parse_relative_duration(token: &str) -> Option<(u32, DurationUnit)> {
    let (amount, suffix) = split_amount(token)?;
    let mut chars = suffix.chars();
    let unit = DurationUnit::from_suffix(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }
    Some((u32::try_from(amount).ok()?, unit))
}

/// Resolve `<N><d|m|y>` to `now` minus N calendar units.
///
/// Month and year steps use calendar arithmetic, so `1m` from March 31
/// lands on the last day of February rather than 30 days earlier.
pub fn resolve_relative_duration(token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (amount, unit) = parse_relative_duration(token)?;
    match unit {
        DurationUnit::Day => now.checked_sub_days(Days::new(u64::from(amount))),
        DurationUnit::Month => now.checked_sub_months(Months::new(amount)),
        DurationUnit::Year => now.checked_sub_months(Months::new(amount.checked_mul(12)?)),
    }
}

/// Resolve `<N>[K|M|G]` to a byte count. No suffix means raw bytes.
pub fn resolve_byte_size(token: &str) -> Option<u64> {
    let (amount, suffix) = split_amount(token)?;
    let multiplier: u64 = match suffix.to_ascii_uppercase().as_str() {
        "" => 1,
        "K" => 1024,
        "M" => 1024 * 1024,
        "G" => 1024 * 1024 * 1024,
        _ => return None,
    };
    amount.checked_mul(multiplier)
}

/// Parse `YYYY-MM-DD` or `YYYY/MM/DD` to midnight UTC.
pub fn parse_absolute_date(value: &str) -> Option<DateTime<Utc>> {
    let bytes = value.as_bytes();
    if bytes.len() != 10 {
        return None;
    }
    let separator = bytes[4];
    if !matches!(separator, b'-' | b'/') || bytes[7] != separator {
        return None;
    }
    let all_digits = bytes
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != 4 && *idx != 7)
        .all(|(_, b)| b.is_ascii_digit());
    if !all_digits {
        return None;
    }

    let year = value[0..4].parse::<i32>().ok()?;
    let month = value[5..7].parse::<u32>().ok()?;
    let day = value[8..10].parse::<u32>().ok()?;
    let midnight = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}
