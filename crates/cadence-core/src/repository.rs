//! Persistence contract for schedule entries.
//!
//! The engine only talks to [`EntryRepository`]. Implementations enforce a
//! uniqueness constraint on `(owner_id, date, scope_id, label, start_time,
//! end_time)`; an insert that loses a race reports
//! [`CreateOutcome::Conflict`] instead of failing.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entry::ScheduleEntry;
use crate::error::{CoreError, Result};
use crate::recurrence::Occurrence;
use crate::time_range::hhmm;

/// Filter for [`EntryRepository::entries_in_range`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQuery {
    pub scope_id: Option<String>,
    pub owner_id: Option<String>,
    /// Inclusive
    pub from: NaiveDate,
    /// Inclusive
    pub to: NaiveDate,
}

impl EntryQuery {
    pub fn range(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            scope_id: None,
            owner_id: None,
            from,
            to,
        }
    }

    pub fn scope(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn matches(&self, entry: &ScheduleEntry) -> bool {
        self.from <= entry.date
            && entry.date <= self.to
            && self.scope_id.as_deref().map_or(true, |s| entry.scope_id == s)
            && self.owner_id.as_deref().map_or(true, |o| entry.owner_id == o)
    }
}

/// The unique key an insert collided with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConflict {
    pub owner_id: String,
    pub date: NaiveDate,
    pub scope_id: String,
    pub label: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl PersistenceConflict {
    pub fn of(entry: &ScheduleEntry) -> Self {
        Self {
            owner_id: entry.owner_id.clone(),
            date: entry.date,
            scope_id: entry.scope_id.clone(),
            label: entry.label.clone(),
            start_time: entry.start_time,
            end_time: entry.end_time,
        }
    }
}

impl fmt::Display for PersistenceConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}-{} '{}' for {}",
            self.scope_id,
            self.date,
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M"),
            self.label,
            self.owner_id
        )
    }
}

/// Result of [`EntryRepository::create_entry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "value")]
pub enum CreateOutcome {
    Created(ScheduleEntry),
    /// An entry with the same key already exists; nothing was written
    Conflict(PersistenceConflict),
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Employee assigned to an entry in addition to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub entry_id: String,
    pub employee_id: String,
    pub assigned_at: DateTime<Utc>,
}

pub trait EntryRepository {
    /// Entries matching `query`, ordered by date, start time and owner.
    fn entries_in_range(&self, query: &EntryQuery) -> Result<Vec<ScheduleEntry>>;

    fn get_entry(&self, id: &str) -> Result<Option<ScheduleEntry>>;

    /// Insert a new entry, reporting a conflict on a duplicate key.
    fn create_entry(&mut self, entry: ScheduleEntry) -> Result<CreateOutcome>;

    /// Overwrite a stored entry.
    ///
    /// # Errors
    /// [`CoreError::EntryNotFound`] if no entry has that id.
    fn update_entry(&mut self, entry: &ScheduleEntry) -> Result<()>;

    /// Delete an entry and its assignments. Returns false if it did not exist.
    fn delete_entry(&mut self, id: &str) -> Result<bool>;

    fn assign(&mut self, entry_id: &str, employee_id: &str) -> Result<()>;

    fn assignments(&self, entry_id: &str) -> Result<Vec<Assignment>>;
}

fn sort_entries(entries: &mut [ScheduleEntry]) {
    entries.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.start_time.cmp(&b.start_time))
            .then_with(|| a.owner_id.cmp(&b.owner_id))
    });
}

/// In-memory repository for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryEntryRepository {
    entries: Vec<ScheduleEntry>,
    assignments: Vec<Assignment>,
}

impl MemoryEntryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all(&self) -> &[ScheduleEntry] {
        &self.entries
    }
}

impl EntryRepository for MemoryEntryRepository {
    fn entries_in_range(&self, query: &EntryQuery) -> Result<Vec<ScheduleEntry>> {
        let mut found: Vec<ScheduleEntry> = self
            .entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        sort_entries(&mut found);
        Ok(found)
    }

    fn get_entry(&self, id: &str) -> Result<Option<ScheduleEntry>> {
        Ok(self.entries.iter().find(|e| e.id == id).cloned())
    }

    fn create_entry(&mut self, entry: ScheduleEntry) -> Result<CreateOutcome> {
        let key = entry.occurrence_key();
        let taken = self
            .entries
            .iter()
            .any(|e| e.owner_id == entry.owner_id && e.occurrence_key() == key);
        if taken {
            return Ok(CreateOutcome::Conflict(PersistenceConflict::of(&entry)));
        }
        self.entries.push(entry.clone());
        Ok(CreateOutcome::Created(entry))
    }

    fn update_entry(&mut self, entry: &ScheduleEntry) -> Result<()> {
        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| CoreError::EntryNotFound(entry.id.clone()))?;
        *slot = entry.clone();
        Ok(())
    }

    fn delete_entry(&mut self, id: &str) -> Result<bool> {
        self.assignments.retain(|a| a.entry_id != id);
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        Ok(self.entries.len() != before)
    }

    fn assign(&mut self, entry_id: &str, employee_id: &str) -> Result<()> {
        if !self.entries.iter().any(|e| e.id == entry_id) {
            return Err(CoreError::EntryNotFound(entry_id.to_string()));
        }
        let exists = self
            .assignments
            .iter()
            .any(|a| a.entry_id == entry_id && a.employee_id == employee_id);
        if !exists {
            self.assignments.push(Assignment {
                entry_id: entry_id.to_string(),
                employee_id: employee_id.to_string(),
                assigned_at: Utc::now(),
            });
        }
        Ok(())
    }

    fn assignments(&self, entry_id: &str) -> Result<Vec<Assignment>> {
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.entry_id == entry_id)
            .cloned()
            .collect())
    }
}
