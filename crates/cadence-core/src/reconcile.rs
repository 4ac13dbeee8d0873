//! Generate, guard and persist occurrences in one caller-triggered pass.
//!
//! Persistence is a sequential loop in ascending date order with optional
//! pacing between items. A duplicate-key conflict is a no-op, and a failed
//! item is recorded in the [`BatchOutcome`] while the loop carries on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::entry::ScheduleEntry;
use crate::error::{ConfigurationError, Result};
use crate::recurrence::{
    expand_rule, filter_new, generate_occurrences, DateWindow, GuardScope, Occurrence,
    OccurrenceDraft, RecurrenceConfig, RecurrenceStore, RecurringTask,
};
use crate::repository::{CreateOutcome, EntryQuery, EntryRepository, PersistenceConflict};

/// How a batch is filtered and paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOptions {
    pub scope: GuardScope,
    /// Pause between consecutive inserts
    pub item_delay: Duration,
}

impl BatchOptions {
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.item_delay = Duration::from_millis(ms);
        self
    }

    pub fn with_scope(mut self, scope: GuardScope) -> Self {
        self.scope = scope;
        self
    }
}

/// One item the repository failed to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub date: NaiveDate,
    pub owner_id: String,
    pub message: String,
}

/// Summary of a generation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub created: Vec<ScheduleEntry>,
    /// Candidates dropped by the guard before any insert was attempted
    pub skipped_duplicates: usize,
    /// Inserts that lost a uniqueness race
    pub conflicts: Vec<PersistenceConflict>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    /// True when no item failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drafts for `config` over `window` that are not already in `existing`.
///
/// Returns the accepted drafts and the number the guard dropped.
pub fn plan_occurrences(
    config: &RecurrenceConfig,
    window: DateWindow,
    owners: &[String],
    existing: &[ScheduleEntry],
    scope: GuardScope,
) -> Result<(Vec<OccurrenceDraft>, usize), ConfigurationError> {
    let candidates: Vec<OccurrenceDraft> = generate_occurrences(config, window, owners)?.collect();
    let total = candidates.len();
    let accepted = filter_new(candidates, existing, config, scope);
    let skipped = total - accepted.len();
    Ok((accepted, skipped))
}

/// Insert `drafts` one at a time, in order.
///
/// Never returns early: conflicts and failures are collected in the outcome.
pub fn persist_batch<R>(repo: &mut R, drafts: Vec<OccurrenceDraft>, options: &BatchOptions) -> BatchOutcome
where
    R: EntryRepository + ?Sized,
{
    let mut outcome = BatchOutcome::default();
    let count = drafts.len();

    for (index, draft) in drafts.into_iter().enumerate() {
        if index > 0 && !options.item_delay.is_zero() {
            std::thread::sleep(options.item_delay);
        }

        let date = draft.date;
        let owner_id = draft.owner_id.clone();
        match repo.create_entry(draft.into_entry()) {
            Ok(CreateOutcome::Created(entry)) => outcome.created.push(entry),
            Ok(CreateOutcome::Conflict(conflict)) => {
                tracing::info!("Occurrence already exists, skipping: {}", conflict);
                outcome.conflicts.push(conflict);
            }
            Err(e) => {
                tracing::warn!("Failed to create occurrence on {} for {}: {}", date, owner_id, e);
                outcome.failures.push(BatchFailure {
                    date,
                    owner_id,
                    message: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Batch finished: {} of {} created, {} conflicts, {} failures",
        outcome.created.len(),
        count,
        outcome.conflicts.len(),
        outcome.failures.len()
    );
    outcome
}

/// Generate the scope's recurring slot over `window` and persist what is new.
///
/// Reads the config from `store` (creating a disabled default on first
/// use) and the existing entries from `repo`. A disabled config produces
/// an empty outcome.
pub fn run_generation<S, R>(
    store: &mut S,
    repo: &mut R,
    scope_id: &str,
    window: DateWindow,
    owners: &[String],
    options: &BatchOptions,
) -> Result<BatchOutcome>
where
    S: RecurrenceStore + ?Sized,
    R: EntryRepository + ?Sized,
{
    window.validate()?;
    let config = store.get_or_create(scope_id)?;
    generate_and_persist(&config, repo, window, owners, options)
}

/// [`run_generation`] with an already loaded config.
pub fn generate_and_persist<R>(
    config: &RecurrenceConfig,
    repo: &mut R,
    window: DateWindow,
    owners: &[String],
    options: &BatchOptions,
) -> Result<BatchOutcome>
where
    R: EntryRepository + ?Sized,
{
    window.validate()?;
    if !config.enabled {
        tracing::debug!(
            "Recurrence disabled for scope {}, nothing to generate",
            config.scope_id
        );
        return Ok(BatchOutcome::default());
    }

    let existing = repo.entries_in_range(
        &EntryQuery::range(window.start, window.end).scope(config.scope_id.as_str()),
    )?;
    let (drafts, skipped) = plan_occurrences(config, window, owners, &existing, options.scope)?;
    if skipped > 0 {
        tracing::debug!(
            "Skipped {} occurrences already present in scope {}",
            skipped,
            config.scope_id
        );
    }

    let mut outcome = persist_batch(repo, drafts, options);
    outcome.skipped_duplicates = skipped;
    Ok(outcome)
}

/// Expand a recurring task over `window` and persist the new occurrences.
///
/// Occurrences already stored for the task's owner are skipped.
pub fn run_rule_expansion<R>(
    repo: &mut R,
    task: &RecurringTask,
    window: DateWindow,
    options: &BatchOptions,
) -> Result<BatchOutcome>
where
    R: EntryRepository + ?Sized,
{
    let drafts = expand_rule(task, window)?;
    let existing = repo.entries_in_range(
        &EntryQuery::range(window.start, window.end)
            .scope(task.scope_id.as_str())
            .owner(task.owner_id.as_str()),
    )?;

    let total = drafts.len();
    let fresh: Vec<OccurrenceDraft> = drafts
        .into_iter()
        .filter(|draft| {
            let key = draft.occurrence_key();
            !existing.iter().any(|e| e.occurrence_key() == key)
        })
        .collect();
    let skipped = total - fresh.len();
    if skipped > 0 {
        tracing::debug!("Skipped {} occurrences of {} already present", skipped, task.task_ref);
    }

    let mut outcome = persist_batch(repo, fresh, options);
    outcome.skipped_duplicates = skipped;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryCategory;
    use crate::error::CoreError;
    use crate::recurrence::{MemoryRecurrenceStore, RecurrenceEnd, RecurrenceRule};
    use crate::repository::{Assignment, MemoryEntryRepository};
    use crate::time_range::WeekdaySet;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn week() -> DateWindow {
        DateWindow::new(date(2024, 1, 1), date(2024, 1, 7))
    }

    fn owners(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn enabled_store() -> MemoryRecurrenceStore {
        let mut store = MemoryRecurrenceStore::new();
        let mut config = store.get_or_create("proj-1").unwrap();
        config.enabled = true;
        store.update(config).unwrap();
        store
    }

    /// Repository that refuses inserts on one date.
    struct FlakyRepo {
        inner: MemoryEntryRepository,
        broken_date: NaiveDate,
    }

    impl EntryRepository for FlakyRepo {
        fn entries_in_range(&self, query: &EntryQuery) -> Result<Vec<ScheduleEntry>> {
            self.inner.entries_in_range(query)
        }
        fn get_entry(&self, id: &str) -> Result<Option<ScheduleEntry>> {
            self.inner.get_entry(id)
        }
        fn create_entry(&mut self, entry: ScheduleEntry) -> Result<CreateOutcome> {
            if entry.date == self.broken_date {
                return Err(CoreError::Validation(crate::error::ValidationError::InvalidValue {
                    field: "date".into(),
                    message: "storage rejected the row".into(),
                }));
            }
            self.inner.create_entry(entry)
        }
        fn update_entry(&mut self, entry: &ScheduleEntry) -> Result<()> {
            self.inner.update_entry(entry)
        }
        fn delete_entry(&mut self, id: &str) -> Result<bool> {
            self.inner.delete_entry(id)
        }
        fn assign(&mut self, entry_id: &str, employee_id: &str) -> Result<()> {
            self.inner.assign(entry_id, employee_id)
        }
        fn assignments(&self, entry_id: &str) -> Result<Vec<Assignment>> {
            self.inner.assignments(entry_id)
        }
    }

    #[test]
    fn disabled_scope_generates_nothing() {
        let mut store = MemoryRecurrenceStore::new();
        let mut repo = MemoryEntryRepository::new();
        let outcome = run_generation(
            &mut store,
            &mut repo,
            "proj-1",
            week(),
            &owners(&["A"]),
            &BatchOptions::default(),
        )
        .unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert!(repo.is_empty());
    }

    #[test]
    fn reversed_window_errors_even_when_disabled() {
        let mut store = MemoryRecurrenceStore::new();
        let mut repo = MemoryEntryRepository::new();
        let window = DateWindow::new(date(2024, 1, 7), date(2024, 1, 1));
        let err = run_generation(&mut store, &mut repo, "proj-1", window, &[], &BatchOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Configuration(ConfigurationError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn second_run_is_idempotent() {
        let mut store = enabled_store();
        let mut repo = MemoryEntryRepository::new();
        let team = owners(&["A", "B"]);
        let options = BatchOptions::default();

        let first = run_generation(&mut store, &mut repo, "proj-1", week(), &team, &options).unwrap();
        assert_eq!(first.created.len(), 10);
        assert_eq!(first.skipped_duplicates, 0);

        let second = run_generation(&mut store, &mut repo, "proj-1", week(), &team, &options).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.skipped_duplicates, 10);
        assert_eq!(repo.len(), 10);
    }

    #[test]
    fn created_entries_are_in_date_order() {
        let mut store = enabled_store();
        let mut repo = MemoryEntryRepository::new();
        let outcome = run_generation(
            &mut store,
            &mut repo,
            "proj-1",
            week(),
            &owners(&["A"]),
            &BatchOptions::default(),
        )
        .unwrap();
        assert!(outcome.created.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn conflicts_are_recorded_not_fatal() {
        let config = enabled_store().get_or_create("proj-1").unwrap();
        let drafts: Vec<_> = generate_occurrences(&config, week(), &owners(&["A"]))
            .unwrap()
            .collect();

        let mut repo = MemoryEntryRepository::new();
        repo.create_entry(drafts[2].clone().into_entry()).unwrap();

        // Guard bypassed to simulate a concurrent writer
        let outcome = persist_batch(&mut repo, drafts, &BatchOptions::default());
        assert_eq!(outcome.created.len(), 4);
        assert_eq!(outcome.conflicts.len(), 1);
        assert!(outcome.is_complete());
    }

    #[test]
    fn failed_item_does_not_abort_batch() {
        let mut store = enabled_store();
        let mut repo = FlakyRepo {
            inner: MemoryEntryRepository::new(),
            broken_date: date(2024, 1, 3),
        };
        let outcome = run_generation(
            &mut store,
            &mut repo,
            "proj-1",
            week(),
            &owners(&["A", "B"]),
            &BatchOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.created.len(), 8);
        assert_eq!(outcome.failures.len(), 2);
        assert!(!outcome.is_complete());
        assert!(outcome.failures.iter().all(|f| f.date == date(2024, 1, 3)));
        assert_eq!(repo.inner.len(), 8);
    }

    #[test]
    fn per_owner_scope_fills_new_team_member() {
        let mut store = enabled_store();
        let mut repo = MemoryEntryRepository::new();
        run_generation(&mut store, &mut repo, "proj-1", week(), &owners(&["A"]), &BatchOptions::default())
            .unwrap();

        let per_day = run_generation(
            &mut store,
            &mut repo,
            "proj-1",
            week(),
            &owners(&["A", "B"]),
            &BatchOptions::default(),
        )
        .unwrap();
        assert!(per_day.created.is_empty());

        let per_owner = run_generation(
            &mut store,
            &mut repo,
            "proj-1",
            week(),
            &owners(&["A", "B"]),
            &BatchOptions::default().with_scope(GuardScope::PerOwnerDay),
        )
        .unwrap();
        assert_eq!(per_owner.created.len(), 5);
        assert!(per_owner.created.iter().all(|e| e.owner_id == "B"));
    }

    #[test]
    fn rule_expansion_skips_stored_occurrences() {
        let task = RecurringTask {
            task_ref: "task-42".into(),
            owner_id: "A".into(),
            scope_id: "proj-1".into(),
            label: "Backup check".into(),
            category: EntryCategory::Task,
            start_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            anchor: date(2024, 1, 1),
            rule: RecurrenceRule::weekly(WeekdaySet::parse_list("mon,thu").unwrap())
                .with_end(RecurrenceEnd::Count(3)),
        };
        let window = DateWindow::new(date(2024, 1, 1), date(2024, 1, 31));
        let mut repo = MemoryEntryRepository::new();

        let first = run_rule_expansion(&mut repo, &task, window, &BatchOptions::default()).unwrap();
        let dates: Vec<_> = first.created.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 4), date(2024, 1, 8)]);
        assert!(first
            .created
            .iter()
            .all(|e| e.task_ref.as_deref() == Some("task-42")));

        let second = run_rule_expansion(&mut repo, &task, window, &BatchOptions::default()).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.skipped_duplicates, 3);
    }
}
