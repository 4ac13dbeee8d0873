//! Weekly hours reports.
//!
//! Reports are derived on demand from an entry snapshot and never stored.
//! Automated standups are excluded: their hours are confirmed at creation
//! and would only pad both totals.

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::deadline::deadline_elapsed;
use crate::entry::ScheduleEntry;

/// Planned versus actual hours for one owner over one week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyReport {
    pub owner_id: String,
    pub scope_id: Option<String>,
    pub week_start: NaiveDate,
    /// Inclusive, `week_start + 6`
    pub week_end: NaiveDate,
    pub total_planned: f64,
    pub total_actual: f64,
    /// Actual minus planned, summed over entries whose deadline has passed
    pub variance_hours: f64,
    pub entries: Vec<ScheduleEntry>,
}

impl WeeklyReport {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregate `entries` for `owner_id` over the week starting at `week_start`.
///
/// `scope_id` narrows the report to one scope when given. Variance only
/// counts entries whose deadline date, in the zone of `now`, is strictly
/// before today; entries without a deadline or with a future one add zero.
pub fn compute_weekly_report<Tz: TimeZone>(
    entries: &[ScheduleEntry],
    owner_id: &str,
    scope_id: Option<&str>,
    week_start: NaiveDate,
    now: &DateTime<Tz>,
) -> WeeklyReport {
    let week_end = week_start + Duration::days(6);

    let mut selected: Vec<ScheduleEntry> = entries
        .iter()
        .filter(|e| e.owner_id == owner_id)
        .filter(|e| scope_id.map_or(true, |scope| e.scope_id == scope))
        .filter(|e| week_start <= e.date && e.date <= week_end)
        .filter(|e| !e.category.is_automated())
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.date.cmp(&b.date).then(a.start_time.cmp(&b.start_time)));

    let mut total_planned = 0.0;
    let mut total_actual = 0.0;
    let mut variance = 0.0;
    for entry in &selected {
        total_planned += entry.planned_hours;
        total_actual += entry.actual_hours;
        if deadline_elapsed(entry, now) {
            variance += entry.hours_delta();
        }
    }

    WeeklyReport {
        owner_id: owner_id.to_string(),
        scope_id: scope_id.map(str::to_string),
        week_start,
        week_end,
        total_planned: round2(total_planned),
        total_actual: round2(total_actual),
        variance_hours: round2(variance),
        entries: selected,
    }
}
