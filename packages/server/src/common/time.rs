//! Riyadh wall-clock helpers.
//!
//! The pickup lifecycle is anchored to Asia/Riyadh time: time slots are
//! entered by users in local time and the sweep job compares them against
//! the local minute. Saudi Arabia observes no daylight saving, so a fixed
//! +03:00 offset is exact.

use chrono::{DateTime, FixedOffset, Utc};

const RIYADH_UTC_OFFSET_SECS: i32 = 3 * 3600;

/// Current time in Riyadh local time.
pub fn riyadh_now() -> DateTime<FixedOffset> {
    to_riyadh(Utc::now())
}

/// Convert a UTC instant to Riyadh local time.
pub fn to_riyadh(instant: DateTime<Utc>) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(RIYADH_UTC_OFFSET_SECS).expect("valid UTC offset");
    instant.with_timezone(&offset)
}

/// Zero-padded 24-hour "HH:MM" for a local instant, the format time-slot
/// start times are stored in.
pub fn minute_of(instant: &DateTime<FixedOffset>) -> String {
    instant.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_riyadh_is_three_hours_ahead_of_utc() {
        let utc = Utc.with_ymd_and_hms(2024, 1, 1, 22, 30, 0).unwrap();
        let local = to_riyadh(utc);
        assert_eq!(minute_of(&local), "01:30");
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_minute_is_zero_padded() {
        let utc = Utc.with_ymd_and_hms(2024, 6, 15, 5, 5, 59).unwrap();
        assert_eq!(minute_of(&to_riyadh(utc)), "08:05");
    }
}
