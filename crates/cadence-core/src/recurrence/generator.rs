//! Expansion of recurrence configurations and rules into dated drafts.
//!
//! Drafts are deterministic: expanding the same inputs twice yields equal
//! drafts. Ids and timestamps are only assigned when a draft is turned into
//! a [`ScheduleEntry`].

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

use super::{DateWindow, RecurrenceConfig, RecurrenceEnd, RecurringTask};
use crate::entry::{
    new_entry_id, DeadlineKind, EntryCategory, EntryStatus, RecurrenceMeta, ScheduleEntry,
};
use crate::error::ConfigurationError;
use crate::time_range::{duration_hours, hhmm, DateRange, WeekdaySet};

/// A candidate entry that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OccurrenceDraft {
    pub owner_id: String,
    pub scope_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub label: String,
    pub category: EntryCategory,
    pub planned_hours: f64,
    pub actual_hours: f64,
    pub status: EntryStatus,
    pub task_ref: Option<String>,
    pub recurrence: Option<RecurrenceMeta>,
}

impl OccurrenceDraft {
    /// Materialize the draft with a fresh id, stamped now.
    pub fn into_entry(self) -> ScheduleEntry {
        self.into_entry_at(Utc::now())
    }

    pub fn into_entry_at(self, now: DateTime<Utc>) -> ScheduleEntry {
        let completed_at = (self.status == EntryStatus::Completed).then_some(now);
        ScheduleEntry {
            id: new_entry_id(),
            owner_id: self.owner_id,
            scope_id: self.scope_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            label: self.label,
            planned_hours: self.planned_hours,
            actual_hours: self.actual_hours,
            status: self.status,
            category: self.category,
            task_ref: self.task_ref,
            parent_entry_id: None,
            sequence_index: None,
            total_group_hours: None,
            paused_at: None,
            resumed_at: None,
            paused_from: None,
            recurrence: self.recurrence,
            deadline: None,
            deadline_kind: DeadlineKind::Soft,
            deadline_reason: None,
            assigned_by_admin: false,
            completed_at,
            created_at: now,
        }
    }
}

/// Initial hours and status for a freshly generated occurrence.
fn initial_state(category: EntryCategory, planned_hours: f64) -> (f64, EntryStatus) {
    if category.is_automated() {
        (planned_hours, EntryStatus::Completed)
    } else {
        (0.0, EntryStatus::Planned)
    }
}

#[derive(Debug, Clone)]
struct SlotTemplate {
    scope_id: String,
    label: String,
    category: EntryCategory,
    start_time: NaiveTime,
    end_time: NaiveTime,
    planned_hours: f64,
    weekdays: WeekdaySet,
}

impl SlotTemplate {
    fn draft_for(&self, date: NaiveDate, owner_id: &str) -> OccurrenceDraft {
        let (actual_hours, status) = initial_state(self.category, self.planned_hours);
        OccurrenceDraft {
            owner_id: owner_id.to_string(),
            scope_id: self.scope_id.clone(),
            date,
            start_time: self.start_time,
            end_time: self.end_time,
            label: self.label.clone(),
            category: self.category,
            planned_hours: self.planned_hours,
            actual_hours,
            status,
            task_ref: None,
            recurrence: None,
        }
    }
}

/// Lazily expanded occurrences of a [`RecurrenceConfig`].
///
/// Yields drafts in ascending date order, owners in input order within a
/// day. Clone before consuming to replay the sequence.
#[derive(Debug, Clone)]
pub struct Occurrences {
    template: Option<SlotTemplate>,
    owners: Vec<String>,
    days: DateRange,
    current_day: Option<NaiveDate>,
    next_owner: usize,
}

impl Iterator for Occurrences {
    type Item = OccurrenceDraft;

    fn next(&mut self) -> Option<OccurrenceDraft> {
        let template = self.template.as_ref()?;
        loop {
            if let Some(day) = self.current_day {
                if let Some(owner) = self.owners.get(self.next_owner) {
                    self.next_owner += 1;
                    return Some(template.draft_for(day, owner));
                }
            }
            let day = self
                .days
                .find(|d| template.weekdays.contains(chrono::Datelike::weekday(d)))?;
            self.current_day = Some(day);
            self.next_owner = 0;
        }
    }
}

impl FusedIterator for Occurrences {}

/// Expand `config` over the inclusive `window` for every owner.
///
/// Disabled configs, empty weekday sets and empty owner lists produce no
/// drafts. Duplicate owner ids are collapsed.
///
/// # Errors
/// Returns [`ConfigurationError::InvalidWindow`] when the window is
/// reversed, and a time-range or missing-field error when an enabled
/// config cannot produce valid entries.
pub fn generate_occurrences(
    config: &RecurrenceConfig,
    window: DateWindow,
    owners: &[String],
) -> Result<Occurrences, ConfigurationError> {
    let days = DateRange::new(window.start, window.end)?;

    let mut unique_owners: Vec<String> = Vec::with_capacity(owners.len());
    for owner in owners {
        if !owner.trim().is_empty() && !unique_owners.contains(owner) {
            unique_owners.push(owner.clone());
        }
    }

    if !config.enabled || config.weekdays.is_empty() || unique_owners.is_empty() {
        return Ok(Occurrences {
            template: None,
            owners: Vec::new(),
            days,
            current_day: None,
            next_owner: 0,
        });
    }

    config.validate()?;
    let template = SlotTemplate {
        scope_id: config.scope_id.clone(),
        label: config.label.clone(),
        category: config.category,
        start_time: config.start_time,
        end_time: config.end_time,
        planned_hours: config.planned_hours()?,
        weekdays: config.weekdays,
    };

    Ok(Occurrences {
        template: Some(template),
        owners: unique_owners,
        days,
        current_day: None,
        next_owner: 0,
    })
}

/// Expand a recurring task into the drafts that fall inside `window`.
///
/// A `Count` end counts occurrences from the anchor, so occurrences before
/// the window still use up the count. Every draft carries the task's
/// `task_ref` and a `parent_group_id` derived from it, so repeated
/// expansion yields the same group.
pub fn expand_rule(
    task: &RecurringTask,
    window: DateWindow,
) -> Result<Vec<OccurrenceDraft>, ConfigurationError> {
    window.validate()?;
    task.rule.validate()?;
    if task.owner_id.trim().is_empty() {
        return Err(ConfigurationError::MissingField("owner_id"));
    }
    if task.scope_id.trim().is_empty() {
        return Err(ConfigurationError::MissingField("scope_id"));
    }
    if task.label.trim().is_empty() {
        return Err(ConfigurationError::MissingField("label"));
    }
    let planned_hours = duration_hours(task.start_time, task.end_time)?;

    let last = match task.rule.end {
        RecurrenceEnd::Until(until) => until.min(window.end),
        _ => window.end,
    };
    let first = match task.rule.end {
        RecurrenceEnd::Count(_) => task.anchor,
        _ => task.anchor.max(window.start),
    };
    if first > last {
        return Ok(Vec::new());
    }

    let meta = RecurrenceMeta {
        rule: task.rule.clone(),
        parent_group_id: format!("group-{}", task.task_ref),
    };
    let (actual_hours, status) = initial_state(task.category, planned_hours);

    let mut drafts = Vec::new();
    let mut seen = 0u32;
    for day in DateRange::new(first, last)? {
        if !task.rule.hits(task.anchor, day) {
            continue;
        }
        seen += 1;
        if let RecurrenceEnd::Count(limit) = task.rule.end {
            if seen > limit {
                break;
            }
        }
        if window.contains(day) {
            drafts.push(OccurrenceDraft {
                owner_id: task.owner_id.clone(),
                scope_id: task.scope_id.clone(),
                date: day,
                start_time: task.start_time,
                end_time: task.end_time,
                label: task.label.clone(),
                category: task.category,
                planned_hours,
                actual_hours,
                status,
                task_ref: Some(task.task_ref.clone()),
                recurrence: Some(meta.clone()),
            });
        }
    }
    Ok(drafts)
}
