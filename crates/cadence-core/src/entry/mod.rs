//! Schedule entries and their status lifecycle.
//!
//! Status follows a small state machine:
//!
//!   PLANNED ───────> IN_PROGRESS ───────> COMPLETED
//!      │    start        │      complete
//!      │                 │
//!      └──> PAUSED <─────┘
//!            │
//!            └── resume: back to the state it was paused from
//!
//! Valid transitions:
//! - PLANNED → IN_PROGRESS (start)
//! - PLANNED → PAUSED, IN_PROGRESS → PAUSED (pause)
//! - PAUSED → PLANNED | IN_PROGRESS (resume, to the prior state)
//! - PLANNED → COMPLETED, IN_PROGRESS → COMPLETED (complete)
//!
//! COMPLETED is terminal. Hour corrections on a completed entry are data
//! updates, not transitions.

pub mod split;

pub use split::{group_progress, remove_segment, segments_of, split_task};

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{ConfigurationError, TransitionError, ValidationError};
use crate::recurrence::RecurrenceRule;
use crate::time_range::{duration_hours, hhmm};

/// Entry status.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Scheduled, not started (initial state)
    #[default]
    Planned,
    /// Work is underway
    InProgress,
    /// Temporarily stopped; resumes to the state it was paused from
    Paused,
    /// Done (terminal)
    Completed,
}

impl EntryStatus {
    /// Parse a status token from any source.
    ///
    /// Canonical tokens, legacy tokens and localized variants map to their
    /// status; anything else becomes [`EntryStatus::Planned`]. Never fails.
    pub fn normalize(raw: &str) -> EntryStatus {
        let token = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match token.as_str() {
            "in_progress" | "inprogress" | "started" | "doing" | "active" | "running"
            | "wip" | "in_bearbeitung" | "en_progreso" | "en_curso" | "en_cours"
            | "進行中" | "作業中" => EntryStatus::InProgress,
            "paused" | "on_hold" | "hold" | "suspended" | "pausiert" | "pausado"
            | "en_pause" | "一時停止" | "中断" => EntryStatus::Paused,
            "completed" | "complete" | "done" | "finished" | "closed" | "erledigt"
            | "abgeschlossen" | "completado" | "terminado" | "terminé" | "termine"
            | "complété" | "完了" | "済" => EntryStatus::Completed,
            _ => EntryStatus::Planned,
        }
    }

    /// Status of a stored row.
    ///
    /// Like [`EntryStatus::normalize`], but a paused token with no
    /// `paused_at` reads as [`EntryStatus::Planned`]: a paused entry always
    /// carries its pause time.
    pub fn from_stored(raw: &str, paused_at: Option<DateTime<Utc>>) -> EntryStatus {
        match EntryStatus::normalize(raw) {
            EntryStatus::Paused if paused_at.is_none() => EntryStatus::Planned,
            status => status,
        }
    }

    /// Canonical storage token.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Planned => "planned",
            EntryStatus::InProgress => "in_progress",
            EntryStatus::Paused => "paused",
            EntryStatus::Completed => "completed",
        }
    }

    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &EntryStatus) -> bool {
        match self {
            EntryStatus::Planned => matches!(
                to,
                EntryStatus::InProgress | EntryStatus::Paused | EntryStatus::Completed
            ),
            EntryStatus::InProgress => {
                matches!(to, EntryStatus::Paused | EntryStatus::Completed)
            }
            EntryStatus::Paused => matches!(to, EntryStatus::Planned | EntryStatus::InProgress),
            EntryStatus::Completed => false,
        }
    }

    /// Get valid next states for this state.
    pub fn valid_transitions(&self) -> &[EntryStatus] {
        match self {
            EntryStatus::Planned => &[
                EntryStatus::InProgress,
                EntryStatus::Paused,
                EntryStatus::Completed,
            ],
            EntryStatus::InProgress => &[EntryStatus::Paused, EntryStatus::Completed],
            EntryStatus::Paused => &[EntryStatus::Planned, EntryStatus::InProgress],
            EntryStatus::Completed => &[],
        }
    }
}

impl<'de> Deserialize<'de> for EntryStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EntryStatus::normalize(&raw))
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work an entry represents.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    /// Recurring standup; confirmed automatically
    Standup,
    #[default]
    Task,
    Meeting,
    Review,
    Other,
}

impl EntryCategory {
    pub fn normalize(raw: &str) -> EntryCategory {
        match raw.trim().to_lowercase().as_str() {
            "standup" | "stand_up" | "stand-up" | "daily" | "daily_standup" => {
                EntryCategory::Standup
            }
            "task" | "work" | "" => EntryCategory::Task,
            "meeting" => EntryCategory::Meeting,
            "review" => EntryCategory::Review,
            _ => EntryCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryCategory::Standup => "standup",
            EntryCategory::Task => "task",
            EntryCategory::Meeting => "meeting",
            EntryCategory::Review => "review",
            EntryCategory::Other => "other",
        }
    }

    /// Automated entries are created already confirmed: completed, with
    /// actual hours equal to planned hours.
    pub fn is_automated(&self) -> bool {
        matches!(self, EntryCategory::Standup)
    }
}

impl<'de> Deserialize<'de> for EntryCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EntryCategory::normalize(&raw))
    }
}

/// How strictly a deadline is enforced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeadlineKind {
    #[default]
    Soft,
    Hard,
}

impl DeadlineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineKind::Soft => "soft",
            DeadlineKind::Hard => "hard",
        }
    }

    pub fn parse(raw: &str) -> DeadlineKind {
        if raw.trim().eq_ignore_ascii_case("hard") {
            DeadlineKind::Hard
        } else {
            DeadlineKind::Soft
        }
    }
}

/// Recurrence metadata carried by entries expanded from a recurring task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceMeta {
    pub rule: RecurrenceRule,
    /// Shared by every occurrence expanded from the same recurring task
    pub parent_group_id: String,
}

/// One dated block of planned work for one owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub id: String,
    pub owner_id: String,
    pub scope_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub label: String,
    pub planned_hours: f64,
    pub actual_hours: f64,
    pub status: EntryStatus,
    pub category: EntryCategory,
    /// Explicit id of the task this entry was created for
    #[serde(default)]
    pub task_ref: Option<String>,
    /// Parent task id when this entry is one segment of a split task
    #[serde(default)]
    pub parent_entry_id: Option<String>,
    /// 1-based position among split siblings
    #[serde(default)]
    pub sequence_index: Option<u32>,
    /// Hours of the whole split group
    #[serde(default)]
    pub total_group_hours: Option<f64>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resumed_at: Option<DateTime<Utc>>,
    /// Status to return to on resume
    #[serde(default)]
    pub paused_from: Option<EntryStatus>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceMeta>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline_kind: DeadlineKind,
    #[serde(default)]
    pub deadline_reason: Option<String>,
    #[serde(default)]
    pub assigned_by_admin: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Generate a fresh entry id.
pub fn new_entry_id() -> String {
    format!("entry-{}", uuid::Uuid::new_v4())
}

impl ScheduleEntry {
    /// Create a one-off planned entry.
    ///
    /// # Errors
    /// Returns a [`ConfigurationError`] if a required field is blank or the
    /// time range is empty or wraps midnight.
    pub fn new(
        owner_id: impl Into<String>,
        scope_id: impl Into<String>,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        label: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let owner_id = owner_id.into();
        let scope_id = scope_id.into();
        let label = label.into();
        if owner_id.trim().is_empty() {
            return Err(ConfigurationError::MissingField("owner_id"));
        }
        if scope_id.trim().is_empty() {
            return Err(ConfigurationError::MissingField("scope_id"));
        }
        if label.trim().is_empty() {
            return Err(ConfigurationError::MissingField("label"));
        }
        let planned_hours = duration_hours(start_time, end_time)?;

        Ok(ScheduleEntry {
            id: new_entry_id(),
            owner_id,
            scope_id,
            date,
            start_time,
            end_time,
            label,
            planned_hours,
            actual_hours: 0.0,
            status: EntryStatus::Planned,
            category: EntryCategory::Task,
            task_ref: None,
            parent_entry_id: None,
            sequence_index: None,
            total_group_hours: None,
            paused_at: None,
            resumed_at: None,
            paused_from: None,
            recurrence: None,
            deadline: None,
            deadline_kind: DeadlineKind::Soft,
            deadline_reason: None,
            assigned_by_admin: false,
            completed_at: None,
            created_at: Utc::now(),
        })
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn is_paused(&self) -> bool {
        self.status == EntryStatus::Paused
    }

    pub fn is_completed(&self) -> bool {
        self.status == EntryStatus::Completed
    }

    /// Actual minus planned hours.
    pub fn hours_delta(&self) -> f64 {
        self.actual_hours - self.planned_hours
    }

    /// Transition to a new status at the current time.
    pub fn transition_to(&mut self, new_status: EntryStatus) -> Result<(), TransitionError> {
        self.transition_at(new_status, Utc::now())
    }

    /// Transition to a new status, stamping timestamps with `now`.
    ///
    /// Returns an error if the transition is invalid; the entry is left
    /// unchanged in that case.
    pub fn transition_at(
        &mut self,
        new_status: EntryStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let from = self.status;
        if !from.can_transition_to(&new_status) {
            return Err(TransitionError {
                from,
                to: new_status,
            });
        }
        if from == EntryStatus::Paused && Some(new_status) != self.resume_target() {
            return Err(TransitionError {
                from,
                to: new_status,
            });
        }

        match new_status {
            EntryStatus::Paused => {
                self.paused_at = Some(now);
                self.resumed_at = None;
                self.paused_from = Some(from);
            }
            EntryStatus::Completed => {
                self.completed_at = Some(now);
            }
            EntryStatus::Planned | EntryStatus::InProgress => {
                if from == EntryStatus::Paused {
                    self.resumed_at = Some(now);
                    self.paused_from = None;
                }
            }
        }

        self.status = new_status;
        Ok(())
    }

    /// Status a paused entry returns to.
    pub fn resume_target(&self) -> Option<EntryStatus> {
        if self.is_paused() {
            Some(self.paused_from.unwrap_or(EntryStatus::Planned))
        } else {
            None
        }
    }

    /// Apply a user-facing action at the current time.
    pub fn apply(&mut self, action: EntryAction) -> Result<(), TransitionError> {
        self.apply_at(action, Utc::now())
    }

    pub fn apply_at(&mut self, action: EntryAction, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let target = match action {
            EntryAction::Start => EntryStatus::InProgress,
            EntryAction::Pause => EntryStatus::Paused,
            EntryAction::Complete => EntryStatus::Completed,
            EntryAction::Resume => self.resume_target().ok_or(TransitionError {
                from: self.status,
                to: EntryStatus::InProgress,
            })?,
        };
        self.transition_at(target, now)
    }

    /// Correct the recorded actual hours.
    ///
    /// Allowed in every status, including completed.
    pub fn set_actual_hours(&mut self, hours: f64) -> Result<(), ValidationError> {
        if !hours.is_finite() || hours < 0.0 {
            return Err(ValidationError::InvalidHours {
                field: "actual_hours",
                value: hours,
            });
        }
        self.actual_hours = hours;
        Ok(())
    }

    /// Set a deadline with its kind and an optional reason.
    pub fn set_deadline(
        &mut self,
        deadline: Option<DateTime<Utc>>,
        kind: DeadlineKind,
        reason: Option<String>,
    ) {
        self.deadline = deadline;
        self.deadline_kind = kind;
        self.deadline_reason = reason;
    }
}

/// Action that moves an entry through its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryAction {
    Start,
    Pause,
    Resume,
    Complete,
}

impl fmt::Display for EntryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryAction::Start => write!(f, "start"),
            EntryAction::Pause => write!(f, "pause"),
            EntryAction::Resume => write!(f, "resume"),
            EntryAction::Complete => write!(f, "complete"),
        }
    }
}
