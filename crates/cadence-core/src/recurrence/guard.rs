//! Duplicate avoidance for generated occurrences.
//!
//! An occurrence is identified by `(date, scope_id, label, start_time,
//! end_time)`. The owner is not part of the key: callers choose the
//! granularity by choosing which snapshot they hand in (see [`GuardScope`]).
//! Every call is evaluated against the snapshot it is given; nothing is
//! cached between calls.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{OccurrenceDraft, RecurrenceConfig};
use crate::entry::ScheduleEntry;

/// Structural identity of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OccurrenceKey<'a> {
    pub date: NaiveDate,
    pub scope_id: &'a str,
    pub label: &'a str,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Anything that occupies an occurrence slot.
pub trait Occurrence {
    fn occurrence_key(&self) -> OccurrenceKey<'_>;
    fn owner_id(&self) -> &str;
}

impl Occurrence for ScheduleEntry {
    fn occurrence_key(&self) -> OccurrenceKey<'_> {
        OccurrenceKey {
            date: self.date,
            scope_id: &self.scope_id,
            label: &self.label,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Occurrence for OccurrenceDraft {
    fn occurrence_key(&self) -> OccurrenceKey<'_> {
        OccurrenceKey {
            date: self.date,
            scope_id: &self.scope_id,
            label: &self.label,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Granularity at which the guard is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuardScope {
    /// Group recurrence: one decision per day, shared by every owner
    #[default]
    PerDay,
    /// Individual recurrence: one decision per (owner, day)
    PerOwnerDay,
}

fn passes<'e, C, I>(candidate: &C, existing: I, config: &RecurrenceConfig) -> bool
where
    C: Occurrence + ?Sized,
    I: IntoIterator<Item = &'e ScheduleEntry>,
{
    let key = candidate.occurrence_key();
    if !config.enabled || !config.weekdays.contains(key.date.weekday()) {
        return false;
    }
    !existing.into_iter().any(|entry| entry.occurrence_key() == key)
}

/// Decide whether `candidate` should be created.
///
/// True iff the config is enabled, the candidate's weekday is in the
/// config's weekday set, and no entry in `existing` has the same
/// occurrence key, whoever owns it.
pub fn should_create<C: Occurrence + ?Sized>(
    candidate: &C,
    existing: &[ScheduleEntry],
    config: &RecurrenceConfig,
) -> bool {
    passes(candidate, existing, config)
}

/// [`should_create`] against only the candidate owner's entries.
pub fn should_create_for_owner<C: Occurrence + ?Sized>(
    candidate: &C,
    existing: &[ScheduleEntry],
    config: &RecurrenceConfig,
) -> bool {
    let owner = candidate.owner_id();
    passes(
        candidate,
        existing.iter().filter(|e| e.owner_id == owner),
        config,
    )
}

/// Keep the candidates that should be created, preserving order.
///
/// Decisions are made once per day (or per owner and day) against
/// `existing`; exact repeats within `candidates` are dropped as well.
pub fn filter_new(
    candidates: Vec<OccurrenceDraft>,
    existing: &[ScheduleEntry],
    config: &RecurrenceConfig,
    scope: GuardScope,
) -> Vec<OccurrenceDraft> {
    let keep: Vec<bool> = {
        let mut decided: HashMap<(Option<&str>, OccurrenceKey<'_>), bool> = HashMap::new();
        let mut taken: HashSet<(&str, OccurrenceKey<'_>)> = HashSet::new();
        candidates
            .iter()
            .map(|candidate| {
                let key = candidate.occurrence_key();
                if !taken.insert((candidate.owner_id.as_str(), key)) {
                    return false;
                }
                let decision_key = match scope {
                    GuardScope::PerDay => (None, key),
                    GuardScope::PerOwnerDay => (Some(candidate.owner_id.as_str()), key),
                };
                *decided.entry(decision_key).or_insert_with(|| match scope {
                    GuardScope::PerDay => should_create(candidate, existing, config),
                    GuardScope::PerOwnerDay => {
                        should_create_for_owner(candidate, existing, config)
                    }
                })
            })
            .collect()
    };

    candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(candidate, keep)| keep.then_some(candidate))
        .collect()
}
