pub mod config;
pub mod deadline;
pub mod entry;
pub mod generate;
pub mod recurrence;
pub mod report;

use cadence_core::time_range::parse_time_of_day;
use cadence_core::Config;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{value}', expected YYYY-MM-DD").into())
}

pub fn parse_time(value: &str) -> Result<NaiveTime, Box<dyn std::error::Error>> {
    Ok(parse_time_of_day(value)?)
}

/// Parse an RFC 3339 instant, or a bare date meaning midnight in the
/// configured reference zone.
pub fn parse_instant(
    value: &str,
    config: &Config,
) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = parse_date(value)?;
    let offset = config.reference_offset()?;
    let local = offset
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .ok_or_else(|| format!("ambiguous local time for '{value}'"))?;
    Ok(local.with_timezone(&Utc))
}

/// Today's date in the reference zone.
pub fn today(config: &Config) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    Ok(config.now()?.date_naive())
}

/// `[from, to]` with defaults: today, and `horizon_days` after `from`.
pub fn resolve_window(
    config: &Config,
    from: Option<String>,
    to: Option<String>,
    horizon_days: u32,
) -> Result<(NaiveDate, NaiveDate), Box<dyn std::error::Error>> {
    let from = match from {
        Some(raw) => parse_date(&raw)?,
        None => today(config)?,
    };
    let to = match to {
        Some(raw) => parse_date(&raw)?,
        None => from + Duration::days(horizon_days as i64),
    };
    Ok((from, to))
}
