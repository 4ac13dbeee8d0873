//! Deadline classification.
//!
//! Both the deadline and "today" are reduced to calendar dates in the zone
//! carried by `now`. Passing `now` as `DateTime<Tz>` makes the reference
//! zone explicit at every call site; converting the deadline with a
//! different zone than `now` is what produces off-by-one overdue results.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::ScheduleEntry;

/// Result of classifying one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeadlineStatus {
    pub overdue: bool,
    /// Deadline falls tomorrow and the entry is not completed
    pub due_soon: bool,
    /// Whole days past the deadline; at least 1 when overdue, else 0
    pub delay_days: i64,
}

/// Coarse deadline state, for display and sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineState {
    NoDeadline,
    Met,
    OnTrack,
    DueSoon,
    Overdue,
}

impl DeadlineStatus {
    pub fn state(&self, entry: &ScheduleEntry) -> DeadlineState {
        if entry.deadline.is_none() {
            DeadlineState::NoDeadline
        } else if self.overdue {
            DeadlineState::Overdue
        } else if self.due_soon {
            DeadlineState::DueSoon
        } else if entry.is_completed() {
            DeadlineState::Met
        } else {
            DeadlineState::OnTrack
        }
    }
}

/// Calendar date of `instant` in the zone of `now`.
pub fn local_date<Tz: TimeZone>(instant: &DateTime<Utc>, now: &DateTime<Tz>) -> NaiveDate {
    instant.with_timezone(&now.timezone()).date_naive()
}

/// Whether the entry's deadline date is strictly before today.
///
/// Ignores status; used by variance accounting as well as classification.
pub fn deadline_elapsed<Tz: TimeZone>(entry: &ScheduleEntry, now: &DateTime<Tz>) -> bool {
    match entry.deadline {
        Some(deadline) => local_date(&deadline, now) < now.date_naive(),
        None => false,
    }
}

/// Classify an entry's deadline relative to `now`.
pub fn classify_deadline<Tz: TimeZone>(entry: &ScheduleEntry, now: &DateTime<Tz>) -> DeadlineStatus {
    let Some(deadline) = entry.deadline else {
        return DeadlineStatus::default();
    };
    if entry.is_completed() {
        return DeadlineStatus::default();
    }

    let today = now.date_naive();
    let deadline_date = local_date(&deadline, now);

    if deadline_date < today {
        DeadlineStatus {
            overdue: true,
            due_soon: false,
            delay_days: (today - deadline_date).num_days().max(1),
        }
    } else {
        DeadlineStatus {
            overdue: false,
            due_soon: today.succ_opt() == Some(deadline_date),
            delay_days: 0,
        }
    }
}

/// Overdue entries with their status, most delayed first.
pub fn overdue_entries<'a, Tz: TimeZone>(
    entries: &'a [ScheduleEntry],
    now: &DateTime<Tz>,
) -> Vec<(&'a ScheduleEntry, DeadlineStatus)> {
    let mut overdue: Vec<_> = entries
        .iter()
        .map(|entry| (entry, classify_deadline(entry, now)))
        .filter(|(_, status)| status.overdue)
        .collect();
    overdue.sort_by(|a, b| {
        b.1.delay_days
            .cmp(&a.1.delay_days)
            .then_with(|| a.0.date.cmp(&b.0.date))
    });
    overdue
}
