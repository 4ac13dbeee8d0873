//! Schedule entry commands for CLI.

use clap::Subcommand;
use cadence_core::entry::group_progress;
use cadence_core::time_range::week_bounds;
use cadence_core::{
    split_task, Config, CoreError, CreateOutcome, DeadlineKind, EntryAction as StatusAction,
    EntryCategory, EntryDb, EntryQuery, EntryRepository, ScheduleEntry,
};
use serde_json::json;

use super::{parse_date, parse_instant, parse_time, today, CliResult};

#[derive(Subcommand)]
pub enum EntryAction {
    /// Create a one-off planned entry
    Create {
        /// Owner (employee) ID
        #[arg(long)]
        owner: String,
        /// Scope (project) ID
        #[arg(long)]
        scope: String,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Start time (HH:MM)
        #[arg(long)]
        start: String,
        /// End time (HH:MM)
        #[arg(long)]
        end: String,
        /// Entry label
        label: String,
        /// Category (task, meeting, review, standup, other)
        #[arg(long, default_value = "task")]
        category: String,
        /// ID of the task this entry belongs to
        #[arg(long)]
        task_ref: Option<String>,
    },
    /// List entries in a date range
    List {
        /// Filter by scope ID
        #[arg(long)]
        scope: Option<String>,
        /// Filter by owner ID
        #[arg(long)]
        owner: Option<String>,
        /// First date (default: Monday of the current week)
        #[arg(long)]
        from: Option<String>,
        /// Last date (default: Sunday of the current week)
        #[arg(long)]
        to: Option<String>,
    },
    /// Get entry details
    Get {
        /// Entry ID
        id: String,
    },
    /// Start an entry
    Start {
        /// Entry ID
        id: String,
    },
    /// Pause an entry
    Pause {
        /// Entry ID
        id: String,
    },
    /// Resume a paused entry
    Resume {
        /// Entry ID
        id: String,
    },
    /// Complete an entry
    Complete {
        /// Entry ID
        id: String,
    },
    /// Record actual hours (allowed in every status)
    Hours {
        /// Entry ID
        id: String,
        /// Actual hours worked
        hours: f64,
    },
    /// Delete an entry and its assignments
    Delete {
        /// Entry ID
        id: String,
    },
    /// Split an entry's work into segments on consecutive days
    Split {
        /// Entry ID of the parent task
        id: String,
        /// Number of segments
        #[arg(long)]
        parts: u32,
        /// Total hours to distribute (default: the entry's planned hours)
        #[arg(long)]
        hours: Option<f64>,
    },
    /// Show the segments of a split task and their progress
    Segments {
        /// Entry ID of the parent task
        id: String,
    },
    /// Set or clear a deadline
    Deadline {
        /// Entry ID
        id: String,
        /// RFC 3339 instant, or YYYY-MM-DD for midnight in the reference zone
        #[arg(long, required_unless_present = "clear")]
        at: Option<String>,
        /// Deadline kind: soft or hard
        #[arg(long, default_value = "soft")]
        kind: String,
        /// Why the deadline exists
        #[arg(long)]
        reason: Option<String>,
        /// Remove the deadline
        #[arg(long)]
        clear: bool,
    },
    /// Assign an additional employee to an entry
    Assign {
        /// Entry ID
        id: String,
        /// Employee ID
        employee: String,
    },
    /// List an entry's assignments
    Assignments {
        /// Entry ID
        id: String,
    },
}

fn load(db: &EntryDb, id: &str) -> Result<ScheduleEntry, CoreError> {
    db.get_entry(id)?
        .ok_or_else(|| CoreError::EntryNotFound(id.to_string()))
}

fn transition(db: &mut EntryDb, id: &str, action: StatusAction) -> CliResult {
    let mut entry = load(db, id)?;
    entry.apply(action)?;
    db.update_entry(&entry)?;
    tracing::debug!("Entry {}: {}", action, entry.id);
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

pub fn run(action: EntryAction) -> CliResult {
    let mut db = EntryDb::open()?;

    match action {
        EntryAction::Create {
            owner,
            scope,
            date,
            start,
            end,
            label,
            category,
            task_ref,
        } => {
            let mut entry = ScheduleEntry::new(
                owner,
                scope,
                parse_date(&date)?,
                parse_time(&start)?,
                parse_time(&end)?,
                label,
            )?;
            entry.category = EntryCategory::normalize(&category);
            entry.task_ref = task_ref;
            match db.create_entry(entry)? {
                CreateOutcome::Created(entry) => {
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                }
                CreateOutcome::Conflict(conflict) => {
                    return Err(format!("entry already exists: {conflict}").into());
                }
            }
        }
        EntryAction::List {
            scope,
            owner,
            from,
            to,
        } => {
            let config = Config::load()?;
            let (monday, sunday) = week_bounds(today(&config)?);
            let from = from.as_deref().map(parse_date).transpose()?.unwrap_or(monday);
            let to = to.as_deref().map(parse_date).transpose()?.unwrap_or(sunday);
            let mut query = EntryQuery::range(from, to);
            if let Some(scope) = scope {
                query = query.scope(scope);
            }
            if let Some(owner) = owner {
                query = query.owner(owner);
            }
            let entries = db.entries_in_range(&query)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        EntryAction::Get { id } => {
            let entry = load(&db, &id)?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        EntryAction::Start { id } => transition(&mut db, &id, StatusAction::Start)?,
        EntryAction::Pause { id } => transition(&mut db, &id, StatusAction::Pause)?,
        EntryAction::Resume { id } => transition(&mut db, &id, StatusAction::Resume)?,
        EntryAction::Complete { id } => transition(&mut db, &id, StatusAction::Complete)?,
        EntryAction::Hours { id, hours } => {
            let mut entry = load(&db, &id)?;
            entry.set_actual_hours(hours)?;
            db.update_entry(&entry)?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        EntryAction::Delete { id } => {
            if !db.delete_entry(&id)? {
                return Err(CoreError::EntryNotFound(id).into());
            }
            println!("{}", serde_json::to_string_pretty(&json!({ "deleted": id }))?);
        }
        EntryAction::Split { id, parts, hours } => {
            let parent = load(&db, &id)?;
            let total = hours.unwrap_or(parent.planned_hours);
            let mut created = Vec::new();
            for segment in split_task(&parent, total, parts)? {
                match db.create_entry(segment)? {
                    CreateOutcome::Created(segment) => created.push(segment),
                    CreateOutcome::Conflict(conflict) => {
                        tracing::warn!("Segment not created: {}", conflict);
                    }
                }
            }
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        EntryAction::Segments { id } => {
            let segments = db.segments(&id)?;
            let progress = group_progress(&id, &segments)
                .map(|(actual, total)| json!({ "actual_hours": actual, "total_hours": total }));
            let view = json!({ "segments": segments, "progress": progress });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        EntryAction::Deadline {
            id,
            at,
            kind,
            reason,
            clear,
        } => {
            let config = Config::load()?;
            let mut entry = load(&db, &id)?;
            if clear {
                entry.set_deadline(None, DeadlineKind::Soft, None);
            } else if let Some(at) = at {
                let deadline = parse_instant(&at, &config)?;
                entry.set_deadline(Some(deadline), DeadlineKind::parse(&kind), reason);
            }
            db.update_entry(&entry)?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        EntryAction::Assign { id, employee } => {
            load(&db, &id)?;
            db.assign(&id, &employee)?;
            println!("{}", serde_json::to_string_pretty(&db.assignments(&id)?)?);
        }
        EntryAction::Assignments { id } => {
            let assignments = db.assignments(&id)?;
            println!("{}", serde_json::to_string_pretty(&assignments)?);
        }
    }
    Ok(())
}
