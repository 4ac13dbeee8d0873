//! Pure date and time-of-day helpers.
//!
//! Everything here works on naive local values: calendar dates, times of
//! day and weekdays. Zone handling lives with the callers that need a
//! "today" (see [`crate::deadline`]).

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Add minutes to a time of day.
///
/// Returns `None` when the result would cross midnight in either direction.
pub fn add_minutes(time: NaiveTime, minutes: i64) -> Option<NaiveTime> {
    if minutes.unsigned_abs() >= MINUTES_PER_DAY as u64 {
        return None;
    }
    let (result, wrapped_secs) = time.overflowing_add_signed(Duration::try_minutes(minutes)?);
    if wrapped_secs != 0 {
        None
    } else {
        Some(result)
    }
}

/// Length of `[start, end)` in whole minutes, rounded to the nearest minute.
///
/// # Errors
/// Returns [`ConfigurationError::InvalidTimeRange`] unless `start < end`.
/// Overnight ranges are not supported.
pub fn duration_minutes(start: NaiveTime, end: NaiveTime) -> Result<i64, ConfigurationError> {
    if end <= start {
        return Err(ConfigurationError::InvalidTimeRange { start, end });
    }
    let secs = (end - start).num_seconds();
    Ok((secs + 30) / 60)
}

/// Length of `[start, end)` in hours, rounded to the minute.
pub fn duration_hours(start: NaiveTime, end: NaiveTime) -> Result<f64, ConfigurationError> {
    Ok(duration_minutes(start, end)? as f64 / 60.0)
}

/// Parse an `HH:MM` (or `HH:MM:SS`) time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ConfigurationError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| ConfigurationError::InvalidTimeOfDay(value.to_string()))
}

/// Format a time of day as `HH:MM`.
pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Monday and Sunday of the ISO week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

/// Serde helpers storing a `NaiveTime` as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time_of_day(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_of_day(&raw).map_err(serde::de::Error::custom)
    }
}

/// Inclusive, ascending range of calendar dates.
///
/// The iterator is `Clone`, so a range can be replayed from the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl DateRange {
    /// Create the range `[start, end]`.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidWindow`] when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigurationError> {
        if start > end {
            return Err(ConfigurationError::InvalidWindow { start, end });
        }
        Ok(Self {
            next: Some(start),
            end,
        })
    }

    /// Number of dates remaining in the range.
    pub fn remaining(&self) -> usize {
        match self.next {
            Some(next) => ((self.end - next).num_days() + 1) as usize,
            None => 0,
        }
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = if current < self.end {
            current.succ_opt()
        } else {
            None
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

/// A set of weekdays stored as a 7-bit mask (bit 0 = Monday).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const fn empty() -> Self {
        WeekdaySet(0)
    }

    pub const fn all() -> Self {
        WeekdaySet(0b111_1111)
    }

    /// Monday through Friday.
    pub const fn weekdays() -> Self {
        WeekdaySet(0b001_1111)
    }

    pub fn single(day: Weekday) -> Self {
        let mut set = Self::empty();
        set.insert(day);
        set
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !(1 << day.num_days_from_monday());
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        ALL_DAYS.into_iter().filter(move |d| self.contains(*d))
    }

    /// Parse a comma-separated list of weekday tokens.
    ///
    /// Accepts names (`mon`, `Monday`), numbers `0..=6` with 0 = Sunday,
    /// and the shorthands `weekdays`, `weekend` and `all`.
    pub fn parse_list(value: &str) -> Result<Self, ConfigurationError> {
        let mut set = Self::empty();
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.to_ascii_lowercase().as_str() {
                "weekdays" => set.0 |= Self::weekdays().0,
                "weekend" => {
                    set.insert(Weekday::Sat);
                    set.insert(Weekday::Sun);
                }
                "all" | "daily" => set = Self::all(),
                _ => set.insert(parse_weekday(token)?),
            }
        }
        Ok(set)
    }
}

/// Parse a single weekday token.
pub fn parse_weekday(token: &str) -> Result<Weekday, ConfigurationError> {
    if let Ok(n) = token.parse::<u8>() {
        return match n {
            0 => Ok(Weekday::Sun),
            1..=6 => Weekday::try_from(n - 1)
                .map_err(|_| ConfigurationError::InvalidWeekday(token.to_string())),
            _ => Err(ConfigurationError::InvalidWeekday(token.to_string())),
        };
    }
    Weekday::from_str(token).map_err(|_| ConfigurationError::InvalidWeekday(token.to_string()))
}

impl From<Vec<Weekday>> for WeekdaySet {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<WeekdaySet> for Vec<Weekday> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn add_minutes_within_day() {
        assert_eq!(add_minutes(time(11, 30), 60), Some(time(12, 30)));
        assert_eq!(add_minutes(time(0, 15), -15), Some(time(0, 0)));
    }

    #[test]
    fn add_minutes_rejects_midnight_wrap() {
        assert_eq!(add_minutes(time(23, 30), 45), None);
        assert_eq!(add_minutes(time(0, 10), -20), None);
    }

    #[test]
    fn add_minutes_rejects_out_of_range_counts() {
        assert_eq!(add_minutes(time(9, 0), i64::MAX), None);
        assert_eq!(add_minutes(time(9, 0), i64::MIN), None);
        assert_eq!(add_minutes(time(0, 0), MINUTES_PER_DAY), None);
        assert_eq!(add_minutes(time(0, 0), MINUTES_PER_DAY - 1), Some(time(23, 59)));
    }

    #[test]
    fn duration_hours_rounds_to_minute() {
        assert_eq!(duration_hours(time(11, 30), time(12, 30)).unwrap(), 1.0);
        assert_eq!(duration_hours(time(9, 0), time(9, 15)).unwrap(), 0.25);

        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(9, 10, 40).unwrap();
        assert_eq!(duration_minutes(start, end).unwrap(), 11);
    }

    #[test]
    fn duration_rejects_zero_and_overnight() {
        assert!(matches!(
            duration_hours(time(9, 0), time(9, 0)),
            Err(ConfigurationError::InvalidTimeRange { .. })
        ));
        assert!(matches!(
            duration_hours(time(22, 0), time(2, 0)),
            Err(ConfigurationError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn date_range_is_inclusive_and_restartable() {
        let range = DateRange::new(date(2024, 1, 30), date(2024, 2, 2)).unwrap();
        assert_eq!(range.remaining(), 4);

        let first: Vec<_> = range.clone().collect();
        let second: Vec<_> = range.collect();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![date(2024, 1, 30), date(2024, 1, 31), date(2024, 2, 1), date(2024, 2, 2)]
        );
    }

    #[test]
    fn date_range_single_day() {
        let days: Vec<_> = DateRange::new(date(2024, 3, 1), date(2024, 3, 1))
            .unwrap()
            .collect();
        assert_eq!(days, vec![date(2024, 3, 1)]);
    }

    #[test]
    fn date_range_rejects_reversed_window() {
        let err = DateRange::new(date(2024, 1, 7), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidWindow { .. }));
    }

    #[test]
    fn weekday_set_membership() {
        let set = WeekdaySet::weekdays();
        assert_eq!(set.len(), 5);
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Fri));
        assert!(!set.contains(Weekday::Sat));
        assert!(!set.contains(Weekday::Sun));
        assert!(WeekdaySet::empty().is_empty());
    }

    #[test]
    fn weekday_set_parse_list() {
        let set = WeekdaySet::parse_list("mon, Wednesday,5").unwrap();
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );

        assert_eq!(WeekdaySet::parse_list("0").unwrap(), WeekdaySet::single(Weekday::Sun));
        assert_eq!(WeekdaySet::parse_list("weekdays").unwrap(), WeekdaySet::weekdays());
        assert!(WeekdaySet::parse_list("funday").is_err());
        assert!(WeekdaySet::parse_list("7").is_err());
    }

    #[test]
    fn weekday_set_serializes_as_names() {
        let set = WeekdaySet::parse_list("mon,fri").unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Mon","Fri"]"#);
        let decoded: WeekdaySet = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn week_bounds_monday_to_sunday() {
        // 2024-01-04 is a Thursday
        let (start, end) = week_bounds(date(2024, 1, 4));
        assert_eq!(start, date(2024, 1, 1));
        assert_eq!(end, date(2024, 1, 7));
        assert_eq!(week_bounds(date(2024, 1, 7)).0, date(2024, 1, 1));
    }

    #[test]
    fn parse_time_of_day_formats() {
        assert_eq!(parse_time_of_day("11:30").unwrap(), time(11, 30));
        assert_eq!(parse_time_of_day("07:05:00").unwrap(), time(7, 5));
        assert!(parse_time_of_day("25:00").is_err());
        assert_eq!(format_time_of_day(time(7, 5)), "07:05");
    }
}
