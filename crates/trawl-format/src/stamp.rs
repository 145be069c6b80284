//! Normalization of the three on-disk timestamp encodings into
//! [`Timestamp`]. Zero means "never recorded" in all three encodings and
//! maps to the absent instant, never to epoch zero.

use time::{Date, Month, PrimitiveDateTime, Time};
use trawl_core::types::Timestamp;

/// Seconds between 1601-01-01 (the file-time epoch) and 1970-01-01.
const FILETIME_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// 32-bit Unix epoch seconds.
pub fn unix32(secs: u32) -> Timestamp {
    if secs == 0 {
        return Timestamp::absent();
    }
    Timestamp::from_unix_seconds(i64::from(secs))
}

/// 64-bit Windows file time: 100-nanosecond intervals since 1601-01-01 UTC.
pub fn filetime(raw: u64) -> Timestamp {
    if raw == 0 {
        return Timestamp::absent();
    }
    let Ok(since_1601) = i64::try_from(raw / 10_000_000) else {
        return Timestamp::absent();
    };
    Timestamp::from_unix_seconds(since_1601 - FILETIME_EPOCH_OFFSET_SECS)
}

/// Legacy packed date/time pair: the date word holds year-since-1980,
/// month and day; the time word holds hour, minute and two-second units.
pub fn dos_datetime(date: u16, time: u16) -> Timestamp {
    if date == 0 && time == 0 {
        return Timestamp::absent();
    }
    let year = 1980 + i32::from(date >> 9);
    let month = ((date >> 5) & 0x0f) as u8;
    let day = (date & 0x1f) as u8;
    let hour = (time >> 11) as u8;
    let minute = ((time >> 5) & 0x3f) as u8;
    let second = ((time & 0x1f) * 2) as u8;

    let Ok(month) = Month::try_from(month) else {
        return Timestamp::absent();
    };
    let Ok(date) = Date::from_calendar_date(year, month, day) else {
        return Timestamp::absent();
    };
    let Ok(time) = Time::from_hms(hour, minute, second) else {
        return Timestamp::absent();
    };
    Timestamp::from_datetime(PrimitiveDateTime::new(date, time).assume_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_zero_is_absent() {
        assert!(unix32(0).is_absent());
        assert_eq!(unix32(1_000_000_000).unix_seconds(), Some(1_000_000_000));
    }

    #[test]
    fn filetime_zero_is_absent() {
        assert!(filetime(0).is_absent());
        // 2000-01-01T00:00:00Z as a file time.
        let ft = (946_684_800 + FILETIME_EPOCH_OFFSET_SECS) as u64 * 10_000_000;
        assert_eq!(filetime(ft).unix_seconds(), Some(946_684_800));
    }

    #[test]
    fn filetime_before_unix_epoch_stays_defined() {
        // One second into 1601.
        assert_eq!(
            filetime(10_000_000).unix_seconds(),
            Some(1 - FILETIME_EPOCH_OFFSET_SECS)
        );
    }

    #[test]
    fn dos_datetime_round_trip() {
        // 2004-07-15 13:45:30 -> year 24, month 7, day 15; 13h 45m 15*2s.
        let date = (24 << 9) | (7 << 5) | 15;
        let time = (13 << 11) | (45 << 5) | 15;
        let stamp = dos_datetime(date, time);
        let dt = stamp.datetime().unwrap();
        assert_eq!(dt.year(), 2004);
        assert_eq!(u8::from(dt.month()), 7);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 13);
        assert_eq!(dt.minute(), 45);
        assert_eq!(dt.second(), 30);
    }

    #[test]
    fn dos_datetime_garbage_is_absent() {
        assert!(dos_datetime(0, 0).is_absent());
        // Month 15 does not exist.
        assert!(dos_datetime((24 << 9) | (15 << 5) | 1, 0).is_absent());
        // Day 0 does not exist.
        assert!(dos_datetime((24 << 9) | (1 << 5), 0).is_absent());
    }
}
