use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use time::OffsetDateTime;

use crate::error::{EngineError, Result};

/// Calendar fields of an instant in a given timezone. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    /// Sunday = 0.
    pub weekday: u8,
}

impl LocalTime {
    pub fn minute_of_day(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }
}

pub fn parse_timezone(id: &str) -> Result<Tz> {
    id.parse::<Tz>().map_err(|_| EngineError::InvalidTimezone(id.to_string()))
}

pub fn resolve(instant: OffsetDateTime, tz: Tz) -> Result<LocalTime> {
    let utc = DateTime::<Utc>::from_timestamp(instant.unix_timestamp(), instant.nanosecond())
        .ok_or(EngineError::InstantOutOfRange(instant))?;
    let local = utc.with_timezone(&tz);

    // chrono's fields are bounded (month <= 12, day <= 31, hour <= 23, ...), so the narrowing is lossless.
    Ok(LocalTime {
        year: local.year(),
        month: local.month() as u8,
        day: local.day() as u8,
        hour: local.hour() as u8,
        minute: local.minute() as u8,
        weekday: local.weekday().num_days_from_sunday() as u8,
    })
}

pub fn resolve_named(instant: OffsetDateTime, timezone_id: &str) -> Result<LocalTime> {
    resolve(instant, parse_timezone(timezone_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn bst_shifts_hour_forward() {
        let lt = resolve_named(datetime!(2025-09-16 12:00:00 UTC), "Europe/London").unwrap();
        assert_eq!((lt.year, lt.month, lt.day), (2025, 9, 16));
        assert_eq!((lt.hour, lt.minute), (13, 0));
        assert_eq!(lt.weekday, 2);
        assert_eq!(lt.minute_of_day(), 780);
    }

    #[test]
    fn weekday_follows_local_date_not_utc_date() {
        // Saturday 23:30 UTC is already Sunday in London during BST.
        let lt = resolve_named(datetime!(2025-09-20 23:30:00 UTC), "Europe/London").unwrap();
        assert_eq!(lt.weekday, 0);
        assert_eq!((lt.day, lt.hour, lt.minute), (21, 0, 30));

        // And still Saturday afternoon in New York.
        let ny = resolve_named(datetime!(2025-09-20 23:30:00 UTC), "America/New_York").unwrap();
        assert_eq!(ny.weekday, 6);
        assert_eq!((ny.hour, ny.minute), (19, 30));
    }

    #[test]
    fn winter_london_matches_utc() {
        let lt = resolve_named(datetime!(2025-01-15 08:15:00 UTC), "Europe/London").unwrap();
        assert_eq!((lt.hour, lt.minute), (8, 15));
        assert_eq!(lt.weekday, 3);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let err = resolve_named(datetime!(2025-01-01 00:00:00 UTC), "Mars/Olympus_Mons").unwrap_err();
        assert_eq!(err, EngineError::InvalidTimezone("Mars/Olympus_Mons".to_string()));
    }
}
