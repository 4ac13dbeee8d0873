//! # Cadence Core Library
//!
//! This library provides the recurrence and schedule reconciliation engine
//! behind the Cadence time-tracking tools. All operations are available via
//! the standalone `cadence-cli` binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Recurrence**: Expansion of per-scope recurring slots and recurring
//!   task rules into dated drafts, plus the duplicate guard
//! - **Entries**: Schedule entries with a status state machine and task splitting
//! - **Deadlines & Reports**: Overdue classification and deadline-aware weekly variance
//! - **Reconcile**: Generate → guard → persist batches with per-item failure collection
//! - **Storage**: SQLite persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`generate_occurrences`]: Expand a [`RecurrenceConfig`] over a date window
//! - [`should_create`]: Duplicate guard against a persisted snapshot
//! - [`classify_deadline`]: Overdue / due-soon classification in a reference zone
//! - [`compute_weekly_report`]: Weekly totals and variance
//! - [`run_generation`]: One full generation pass against a repository
//! - [`EntryDb`]: SQLite implementation of [`EntryRepository`] and [`RecurrenceStore`]

pub mod deadline;
pub mod entry;
pub mod error;
pub mod reconcile;
pub mod recurrence;
pub mod report;
pub mod repository;
pub mod storage;
pub mod time_range;

pub use deadline::{classify_deadline, overdue_entries, DeadlineState, DeadlineStatus};
pub use entry::{
    split_task, DeadlineKind, EntryAction, EntryCategory, EntryStatus, RecurrenceMeta,
    ScheduleEntry,
};
pub use error::{
    ConfigError, ConfigurationError, CoreError, DatabaseError, TransitionError, ValidationError,
};
pub use reconcile::{run_generation, run_rule_expansion, BatchFailure, BatchOptions, BatchOutcome};
pub use recurrence::{
    expand_rule, filter_new, generate_occurrences, should_create, DateWindow, GuardScope,
    MemoryRecurrenceStore, OccurrenceDraft, RecurrenceConfig, RecurrenceEnd, RecurrenceKind,
    RecurrenceRule, RecurrenceStore, RecurringTask,
};
pub use report::{compute_weekly_report, WeeklyReport};
pub use repository::{
    CreateOutcome, EntryQuery, EntryRepository, MemoryEntryRepository, PersistenceConflict,
};
pub use storage::{Config, EntryDb};
pub use time_range::WeekdaySet;
