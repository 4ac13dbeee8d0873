//! Occurrence generation commands for CLI.

use clap::Subcommand;
use cadence_core::reconcile::generate_and_persist;
use cadence_core::{
    run_rule_expansion, BatchOutcome, Config, DateWindow, EntryCategory, EntryDb, RecurrenceEnd,
    RecurrenceKind, RecurrenceRule, RecurrenceStore, RecurringTask, WeekdaySet,
};
use serde_json::json;

use super::{parse_date, parse_time, resolve_window, CliResult};

#[derive(Subcommand)]
pub enum GenerateAction {
    /// Generate a scope's recurring slot for each owner over a window
    Slots {
        /// Scope ID
        scope: String,
        /// First date (default: today in the reference zone)
        #[arg(long)]
        from: Option<String>,
        /// Last date (default: from + generation_horizon_days)
        #[arg(long)]
        to: Option<String>,
        /// Owner to generate for; repeatable (default: team.members)
        #[arg(long = "owner")]
        owners: Vec<String>,
        /// Guard granularity: per_day or per_owner_day (default: engine.guard_scope)
        #[arg(long)]
        guard: Option<String>,
    },
    /// Expand a recurring task rule and persist its new occurrences
    Rule {
        /// ID of the originating task
        task_ref: String,
        /// Owner of the occurrences
        #[arg(long)]
        owner: String,
        /// Scope ID
        #[arg(long)]
        scope: String,
        /// Label of the occurrences
        #[arg(long)]
        label: String,
        /// Start time (HH:MM)
        #[arg(long)]
        start: String,
        /// End time (HH:MM)
        #[arg(long)]
        end: String,
        /// First candidate date of the series (YYYY-MM-DD)
        #[arg(long)]
        anchor: String,
        /// Rule kind: daily, weekly or interval
        #[arg(long, default_value = "daily")]
        kind: String,
        /// Every N days (daily, interval) or weeks (weekly)
        #[arg(long, default_value = "1")]
        interval: u32,
        /// Comma-separated weekdays
        #[arg(long)]
        weekdays: Option<String>,
        /// Last eligible date, inclusive
        #[arg(long, conflicts_with = "count")]
        until: Option<String>,
        /// Total occurrences counted from the anchor
        #[arg(long)]
        count: Option<u32>,
        /// Entry category
        #[arg(long, default_value = "task")]
        category: String,
        /// First date of the expansion window (default: today)
        #[arg(long)]
        from: Option<String>,
        /// Last date of the expansion window (default: from + generation_horizon_days)
        #[arg(long)]
        to: Option<String>,
    },
}

pub fn run(action: GenerateAction) -> CliResult {
    let config = Config::load()?;
    let mut db = EntryDb::open()?;
    let mut options = config.batch_options();

    let outcome = match action {
        GenerateAction::Slots {
            scope,
            from,
            to,
            owners,
            guard,
        } => {
            let (from, to) =
                resolve_window(&config, from, to, config.engine.generation_horizon_days)?;
            let owners = if owners.is_empty() {
                config.team.members.clone()
            } else {
                owners
            };
            if owners.is_empty() {
                return Err("no owners given and team.members is empty".into());
            }
            if let Some(guard) = guard {
                options = options.with_scope(serde_json::from_value(json!(guard))?);
            }

            let recurrence = db.get_or_create(&scope)?;
            if !recurrence.enabled {
                eprintln!("recurrence is disabled for {scope}");
            }
            generate_and_persist(
                &recurrence,
                &mut db,
                DateWindow::new(from, to),
                &owners,
                &options,
            )?
        }
        GenerateAction::Rule {
            task_ref,
            owner,
            scope,
            label,
            start,
            end,
            anchor,
            kind,
            interval,
            weekdays,
            until,
            count,
            category,
            from,
            to,
        } => {
            let (from, to) =
                resolve_window(&config, from, to, config.engine.generation_horizon_days)?;
            let kind: RecurrenceKind = serde_json::from_value(json!(kind.to_lowercase()))?;
            let series_end = match (until, count) {
                (Some(until), _) => RecurrenceEnd::Until(parse_date(&until)?),
                (None, Some(count)) => RecurrenceEnd::Count(count),
                (None, None) => RecurrenceEnd::Never,
            };
            let weekdays = match weekdays {
                Some(raw) => WeekdaySet::parse_list(&raw)?,
                None => WeekdaySet::empty(),
            };
            let task = RecurringTask {
                task_ref,
                owner_id: owner,
                scope_id: scope,
                label,
                category: EntryCategory::normalize(&category),
                start_time: parse_time(&start)?,
                end_time: parse_time(&end)?,
                anchor: parse_date(&anchor)?,
                rule: RecurrenceRule {
                    kind,
                    interval,
                    weekdays,
                    end: series_end,
                },
            };
            run_rule_expansion(&mut db, &task, DateWindow::new(from, to), &options)?
        }
    };

    print_outcome(&outcome)
}

fn print_outcome(outcome: &BatchOutcome) -> CliResult {
    let created: Vec<_> = outcome
        .created
        .iter()
        .map(|entry| json!({ "id": entry.id, "owner_id": entry.owner_id, "date": entry.date }))
        .collect();
    let summary = json!({
        "created": created,
        "skipped_duplicates": outcome.skipped_duplicates,
        "conflicts": outcome.conflicts,
        "failures": outcome.failures,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !outcome.is_complete() {
        eprintln!("{} occurrence(s) failed to persist", outcome.failures.len());
    }
    Ok(())
}
