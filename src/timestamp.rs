//! Member timestamp conversion.
//!
//! Archive headers carry modification times in a few encodings:
//!
//! - MS-DOS packed date/time (zip local and central headers, rar): 2-second
//!   precision, years 1980..=2107, no time zone. Values are interpreted as UTC.
//! - Unix seconds (tar headers, pax `mtime`, the zip extended timestamp
//!   extra field).
//!
//! Conversions return `None` when the encoded value is not a valid instant.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SECONDS_PER_DAY: i64 = 86_400;

/// Converts an MS-DOS packed date and time to a [`SystemTime`].
///
/// # Example
///
/// ```rust
/// use burrow::timestamp::from_dos;
/// use std::time::{Duration, UNIX_EPOCH};
///
/// // 1980-01-01 00:00:00
/// let t = from_dos(0x0021, 0x0000).unwrap();
/// assert_eq!(t, UNIX_EPOCH + Duration::from_secs(315_532_800));
/// ```
pub fn from_dos(date: u16, time: u16) -> Option<SystemTime> {
    let year = 1980 + i64::from(date >> 9);
    let month = u32::from((date >> 5) & 0x0f);
    let day = u32::from(date & 0x1f);
    let hour = i64::from(time >> 11);
    let minute = i64::from((time >> 5) & 0x3f);
    let second = i64::from(time & 0x1f) * 2;

    if !(1..=12).contains(&month) || day == 0 || hour > 23 || minute > 59 || second > 59 {
        return None;
    }

    let days = days_from_civil(year, month, day);
    from_unix_secs(days * SECONDS_PER_DAY + hour * 3600 + minute * 60 + second)
}

/// Converts a combined 32-bit DOS timestamp (date in the high half).
pub fn from_dos_u32(value: u32) -> Option<SystemTime> {
    from_dos((value >> 16) as u16, (value & 0xffff) as u16)
}

/// Converts Unix seconds to a [`SystemTime`].
pub fn from_unix_secs(secs: i64) -> Option<SystemTime> {
    if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_secs(secs.unsigned_abs()))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs()))
    }
}

// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = i64::from(month);
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(t: SystemTime) -> u64 {
        t.duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    #[test]
    fn test_dos_epoch() {
        assert_eq!(secs(from_dos(0x0021, 0).unwrap()), 315_532_800);
    }

    #[test]
    fn test_dos_known_instant() {
        // 2016-04-17 13:45:30
        let date = ((2016 - 1980) << 9) | (4 << 5) | 17;
        let time = (13 << 11) | (45 << 5) | (30 / 2);
        assert_eq!(secs(from_dos(date, time).unwrap()), 1_460_900_730);
    }

    #[test]
    fn test_dos_leap_day() {
        // 2024-02-29 00:00:00
        let date = ((2024 - 1980) << 9) | (2 << 5) | 29;
        assert_eq!(secs(from_dos(date, 0).unwrap()), 1_709_164_800);
    }

    #[test]
    fn test_dos_invalid_fields() {
        assert!(from_dos(0, 0).is_none());
        assert!(from_dos((13 << 5) | 1, 0).is_none());
        assert!(from_dos(0x0021, 24 << 11).is_none());
    }

    #[test]
    fn test_dos_u32_split() {
        let value = (0x0021u32 << 16) | 0x0001;
        assert_eq!(secs(from_dos_u32(value).unwrap()), 315_532_802);
    }

    #[test]
    fn test_unix_secs() {
        assert_eq!(from_unix_secs(0), Some(UNIX_EPOCH));
        assert_eq!(
            from_unix_secs(-10),
            UNIX_EPOCH.checked_sub(Duration::from_secs(10))
        );
    }
}
