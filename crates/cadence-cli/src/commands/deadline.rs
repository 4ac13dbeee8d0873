//! Deadline classification commands for CLI.

use clap::Subcommand;
use cadence_core::{
    classify_deadline, overdue_entries, Config, CoreError, EntryDb, EntryQuery, EntryRepository,
};
use chrono::Duration;
use serde_json::json;

use super::{parse_date, today, CliResult};

/// How far back `deadline overdue` looks when no start date is given.
const DEFAULT_LOOKBACK_DAYS: i64 = 365;

#[derive(Subcommand)]
pub enum DeadlineAction {
    /// Classify one entry's deadline relative to today
    Status {
        /// Entry ID
        id: String,
    },
    /// List overdue entries, most delayed first
    Overdue {
        /// Filter by scope ID
        #[arg(long)]
        scope: Option<String>,
        /// Filter by owner ID
        #[arg(long)]
        owner: Option<String>,
        /// First entry date to consider (default: a year ago)
        #[arg(long)]
        from: Option<String>,
        /// Last entry date to consider (default: today + generation_horizon_days)
        #[arg(long)]
        to: Option<String>,
    },
}

pub fn run(action: DeadlineAction) -> CliResult {
    let config = Config::load()?;
    let db = EntryDb::open()?;
    let now = config.now()?;

    match action {
        DeadlineAction::Status { id } => {
            let entry = db
                .get_entry(&id)?
                .ok_or_else(|| CoreError::EntryNotFound(id.clone()))?;
            let status = classify_deadline(&entry, &now);
            let view = json!({
                "id": entry.id,
                "deadline": entry.deadline,
                "deadline_kind": entry.deadline_kind,
                "state": status.state(&entry),
                "overdue": status.overdue,
                "due_soon": status.due_soon,
                "delay_days": status.delay_days,
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        DeadlineAction::Overdue {
            scope,
            owner,
            from,
            to,
        } => {
            let today = today(&config)?;
            let from = match from {
                Some(raw) => parse_date(&raw)?,
                None => today - Duration::days(DEFAULT_LOOKBACK_DAYS),
            };
            let to = match to {
                Some(raw) => parse_date(&raw)?,
                None => today + Duration::days(config.engine.generation_horizon_days as i64),
            };
            let mut query = EntryQuery::range(from, to);
            if let Some(scope) = scope {
                query = query.scope(scope);
            }
            if let Some(owner) = owner {
                query = query.owner(owner);
            }

            let entries = db.entries_in_range(&query)?;
            let overdue: Vec<_> = overdue_entries(&entries, &now)
                .into_iter()
                .map(|(entry, status)| {
                    json!({
                        "id": entry.id,
                        "owner_id": entry.owner_id,
                        "scope_id": entry.scope_id,
                        "label": entry.label,
                        "date": entry.date,
                        "deadline": entry.deadline,
                        "deadline_kind": entry.deadline_kind,
                        "delay_days": status.delay_days,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&overdue)?);
        }
    }
    Ok(())
}
