use clap::Subcommand;
use cadence_core::time_range::week_bounds;
use cadence_core::{compute_weekly_report, Config, EntryDb, EntryQuery, EntryRepository};

use super::{parse_date, today, CliResult};

#[derive(Subcommand)]
pub enum ReportAction {
    /// Planned vs actual hours for one owner over one week
    Weekly {
        /// Owner (employee) ID
        owner: String,
        /// Narrow the report to one scope
        #[arg(long)]
        scope: Option<String>,
        /// Any date in the week to report (default: today)
        #[arg(long)]
        week: Option<String>,
    },
}

pub fn run(action: ReportAction) -> CliResult {
    let config = Config::load()?;
    let db = EntryDb::open()?;

    match action {
        ReportAction::Weekly { owner, scope, week } => {
            let day = match week {
                Some(raw) => parse_date(&raw)?,
                None => today(&config)?,
            };
            let (monday, sunday) = week_bounds(day);
            let query = EntryQuery::range(monday, sunday).owner(owner.as_str());
            let entries = db.entries_in_range(&query)?;
            let report =
                compute_weekly_report(&entries, &owner, scope.as_deref(), monday, &config.now()?);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
