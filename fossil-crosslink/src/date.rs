//! Minimal ISO-8601 UTC timestamp parsing for D-cards
//! (`YYYY-MM-DDTHH:MM:SS[.fff]`), converted to a Unix epoch `f64` for
//! storage in the `mtime REAL` columns the repository schema uses.

use crate::error::Error;

const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_since_epoch(year: i64, month: u32, day: u32) -> i64 {
    let mut days: i64 = 0;
    if year >= 1970 {
        for y in 1970..year {
            days += if is_leap(y) { 366 } else { 365 };
        }
    } else {
        for y in year..1970 {
            days -= if is_leap(y) { 366 } else { 365 };
        }
    }
    for m in 0..(month as usize - 1) {
        days += DAYS_IN_MONTH[m] as i64;
        if m == 1 && is_leap(year) {
            days += 1;
        }
    }
    days + (day as i64 - 1)
}

/// Parse `text` (e.g. `2024-01-02T15:04:05.250Z`) into seconds since the
/// Unix epoch. The trailing `Z`/fractional seconds are optional.
pub fn parse_date(text: &str) -> Result<f64, Error> {
    let bad = || Error::BadDate(text.to_string());

    let text = text.trim().trim_end_matches('Z');
    let (date_part, time_part) = text.split_once('T').ok_or_else(bad)?;

    let mut date_fields = date_part.split('-');
    let year: i64 = date_fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let month: u32 = date_fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let day: u32 = date_fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(bad());
    }

    let (time_main, frac) = match time_part.split_once('.') {
        Some((main, frac)) => (main, frac),
        None => (time_part, "0"),
    };
    let mut time_fields = time_main.split(':');
    let hour: u32 = time_fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let minute: u32 = time_fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let second: f64 = time_fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if hour > 23 || minute > 59 {
        return Err(bad());
    }
    let frac: f64 = format!("0.{frac}").parse().map_err(|_| bad())?;

    let days = days_since_epoch(year, month, day);
    let seconds_of_day = hour as f64 * 3600.0 + minute as f64 * 60.0 + second + frac;
    Ok(days as f64 * 86400.0 + seconds_of_day)
}

/// Inverse of [`parse_date`]: format seconds since the Unix epoch as
/// `YYYY-MM-DDTHH:MM:SS.fff` (millisecond precision, no trailing `Z`,
/// matching the form D-cards already carry in the schema).
pub fn format_date(epoch_secs: f64) -> String {
    let total_days = (epoch_secs / 86400.0).floor() as i64;
    let mut secs_of_day = epoch_secs - (total_days as f64) * 86400.0;
    if secs_of_day < 0.0 {
        secs_of_day += 86400.0;
    }

    let mut year = 1970i64;
    let mut remaining = total_days;
    loop {
        let year_len = if is_leap(year) { 366 } else { 365 };
        if remaining >= year_len {
            remaining -= year_len;
            year += 1;
        } else if remaining < 0 {
            year -= 1;
            remaining += if is_leap(year) { 366 } else { 365 };
        } else {
            break;
        }
    }

    let mut month = 1u32;
    let mut day_of_year = remaining;
    for (idx, &len) in DAYS_IN_MONTH.iter().enumerate() {
        let len = len as i64 + if idx == 1 && is_leap(year) { 1 } else { 0 };
        if day_of_year < len {
            month = idx as u32 + 1;
            break;
        }
        day_of_year -= len;
    }
    let day = day_of_year + 1;

    let hour = (secs_of_day / 3600.0) as u32;
    let minute = ((secs_of_day % 3600.0) / 60.0) as u32;
    let second = secs_of_day % 60.0;

    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:06.3}")
}
