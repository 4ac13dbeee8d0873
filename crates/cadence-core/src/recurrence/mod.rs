//! Recurrence configuration and rules.
//!
//! Two shapes of repetition are supported:
//! - [`RecurrenceConfig`]: one per scope, a weekday-set daily slot (the
//!   standup) expanded for every eligible owner.
//! - [`RecurrenceRule`]: per-task repetition with a fixed interval and an
//!   optional end date or occurrence cap.

pub mod generator;
pub mod guard;
pub mod store;

pub use generator::{expand_rule, generate_occurrences, OccurrenceDraft, Occurrences};
pub use guard::{
    filter_new, should_create, should_create_for_owner, GuardScope, Occurrence, OccurrenceKey,
};
pub use store::{MemoryRecurrenceStore, RecurrenceStore};

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::entry::EntryCategory;
use crate::error::ConfigurationError;
use crate::time_range::{duration_hours, hhmm, week_bounds, WeekdaySet};

/// Inclusive date window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.start > self.end {
            return Err(ConfigurationError::InvalidWindow {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Per-scope recurring slot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceConfig {
    pub scope_id: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub label: String,
    pub category: EntryCategory,
    pub weekdays: WeekdaySet,
    pub enabled: bool,
}

impl RecurrenceConfig {
    /// The configuration a scope gets before anyone edits it: a
    /// 15-minute Mon-Fri standup at 09:00, disabled.
    pub fn disabled_default(scope_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end_time: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            label: "Daily Standup".to_string(),
            category: EntryCategory::Standup,
            weekdays: WeekdaySet::weekdays(),
            enabled: false,
        }
    }

    /// Whether a date is a recurrence day under this config.
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.enabled && self.weekdays.contains(date.weekday())
    }

    /// Hours of one occurrence, rounded to the minute.
    pub fn planned_hours(&self) -> Result<f64, ConfigurationError> {
        duration_hours(self.start_time, self.end_time)
    }

    /// Check required fields and the time range.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.scope_id.trim().is_empty() {
            return Err(ConfigurationError::MissingField("scope_id"));
        }
        if self.label.trim().is_empty() {
            return Err(ConfigurationError::MissingField("label"));
        }
        self.planned_hours().map(|_| ())
    }
}

/// Repetition shape for recurring tasks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    /// Every `interval` days, optionally limited to a weekday set
    Daily,
    /// Every `interval` weeks on the weekday set (anchor weekday if empty)
    Weekly,
    /// Every `interval` days, weekdays ignored
    Interval,
}

/// When a recurring task stops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum RecurrenceEnd {
    #[default]
    Never,
    /// Last eligible date, inclusive
    Until(NaiveDate),
    /// Total number of occurrences counted from the anchor
    Count(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceRule {
    pub kind: RecurrenceKind,
    pub interval: u32,
    #[serde(default)]
    pub weekdays: WeekdaySet,
    #[serde(default)]
    pub end: RecurrenceEnd,
}

impl RecurrenceRule {
    pub fn daily() -> Self {
        Self {
            kind: RecurrenceKind::Daily,
            interval: 1,
            weekdays: WeekdaySet::empty(),
            end: RecurrenceEnd::Never,
        }
    }

    pub fn weekly(weekdays: WeekdaySet) -> Self {
        Self {
            kind: RecurrenceKind::Weekly,
            interval: 1,
            weekdays,
            end: RecurrenceEnd::Never,
        }
    }

    pub fn every_n_days(interval: u32) -> Self {
        Self {
            kind: RecurrenceKind::Interval,
            interval,
            weekdays: WeekdaySet::empty(),
            end: RecurrenceEnd::Never,
        }
    }

    pub fn with_end(mut self, end: RecurrenceEnd) -> Self {
        self.end = end;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.interval == 0 {
            return Err(ConfigurationError::InvalidInterval(self.interval));
        }
        Ok(())
    }

    /// Whether `date` is an occurrence of a rule anchored at `anchor`,
    /// ignoring the end condition.
    pub fn hits(&self, anchor: NaiveDate, date: NaiveDate) -> bool {
        if date < anchor || self.interval == 0 {
            return false;
        }
        let interval = self.interval as i64;
        match self.kind {
            RecurrenceKind::Daily => {
                (date - anchor).num_days() % interval == 0
                    && (self.weekdays.is_empty() || self.weekdays.contains(date.weekday()))
            }
            RecurrenceKind::Weekly => {
                let days = if self.weekdays.is_empty() {
                    WeekdaySet::single(anchor.weekday())
                } else {
                    self.weekdays
                };
                let weeks = (week_bounds(date).0 - week_bounds(anchor).0).num_days() / 7;
                weeks % interval == 0 && days.contains(date.weekday())
            }
            RecurrenceKind::Interval => (date - anchor).num_days() % interval == 0,
        }
    }
}

/// A task that repeats under a [`RecurrenceRule`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringTask {
    /// Id of the originating task; copied into every occurrence
    pub task_ref: String,
    pub owner_id: String,
    pub scope_id: String,
    pub label: String,
    pub category: EntryCategory,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// First candidate date of the series
    pub anchor: NaiveDate,
    pub rule: RecurrenceRule,
}
