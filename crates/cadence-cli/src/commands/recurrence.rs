//! Per-scope recurring slot commands for CLI.

use clap::Subcommand;
use cadence_core::{EntryCategory, EntryDb, RecurrenceStore, WeekdaySet};

use super::{parse_time, CliResult};

#[derive(Subcommand)]
pub enum RecurrenceAction {
    /// Show a scope's config (created disabled on first read)
    Show {
        /// Scope ID
        scope: String,
    },
    /// List all stored configs
    List,
    /// Update a scope's recurring slot
    Set {
        /// Scope ID
        scope: String,
        /// Start time (HH:MM)
        #[arg(long)]
        start: Option<String>,
        /// End time (HH:MM)
        #[arg(long)]
        end: Option<String>,
        /// Label given to generated entries
        #[arg(long)]
        label: Option<String>,
        /// Category of generated entries (standup, task, meeting, review)
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated weekdays (e.g. "mon,wed,fri", "weekdays", "0,6")
        #[arg(long)]
        weekdays: Option<String>,
        /// Enable or disable generation
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Enable generation for a scope
    Enable {
        /// Scope ID
        scope: String,
    },
    /// Disable generation for a scope
    Disable {
        /// Scope ID
        scope: String,
    },
}

pub fn run(action: RecurrenceAction) -> CliResult {
    let mut db = EntryDb::open()?;

    match action {
        RecurrenceAction::Show { scope } => {
            let config = db.get_or_create(&scope)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        RecurrenceAction::List => {
            let configs = db.list()?;
            println!("{}", serde_json::to_string_pretty(&configs)?);
        }
        RecurrenceAction::Set {
            scope,
            start,
            end,
            label,
            category,
            weekdays,
            enabled,
        } => {
            let mut config = db.get_or_create(&scope)?;
            if let Some(start) = start {
                config.start_time = parse_time(&start)?;
            }
            if let Some(end) = end {
                config.end_time = parse_time(&end)?;
            }
            if let Some(label) = label {
                config.label = label;
            }
            if let Some(category) = category {
                config.category = EntryCategory::normalize(&category);
            }
            if let Some(weekdays) = weekdays {
                config.weekdays = WeekdaySet::parse_list(&weekdays)?;
            }
            if let Some(enabled) = enabled {
                config.enabled = enabled;
            }
            let saved = db.update(config)?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
        RecurrenceAction::Enable { scope } => {
            let mut config = db.get_or_create(&scope)?;
            config.enabled = true;
            let saved = db.update(config)?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
        RecurrenceAction::Disable { scope } => {
            let mut config = db.get_or_create(&scope)?;
            config.enabled = false;
            let saved = db.update(config)?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
    }
    Ok(())
}
