//! SQLite-based storage for schedule entries and recurrence configs.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::data_dir;
use super::migrations;
use crate::entry::{DeadlineKind, EntryCategory, EntryStatus, RecurrenceMeta, ScheduleEntry};
use crate::error::{CoreError, DatabaseError, Result};
use crate::recurrence::{RecurrenceConfig, RecurrenceStore};
use crate::repository::{
    Assignment, CreateOutcome, EntryQuery, EntryRepository, PersistenceConflict,
};
use crate::time_range::{format_time_of_day, parse_time_of_day, WeekdaySet};

// === Helper Functions ===

const ENTRY_COLUMNS: &str = "id, owner_id, scope_id, date, start_time, end_time, label,
     planned_hours, actual_hours, status, category, task_ref, parent_entry_id,
     sequence_index, total_group_hours, paused_at, resumed_at, paused_from,
     recurrence, deadline, deadline_kind, deadline_reason, assigned_by_admin,
     completed_at, created_at";

/// Format a date for database storage
fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_error<E>(index: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

/// Parse a date column
fn parse_date(row: &rusqlite::Row, index: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(index)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(index, e))
}

/// Parse an `HH:MM` column
fn parse_time(row: &rusqlite::Row, index: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(index)?;
    parse_time_of_day(&raw).map_err(|e| conversion_error(index, e))
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse an optional RFC3339 column, dropping unparseable values
fn parse_datetime_opt(dt_str: Option<String>) -> Option<DateTime<Utc>> {
    dt_str.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

fn format_datetime_opt(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(|dt| dt.to_rfc3339())
}

/// Build a ScheduleEntry from a row selected with `ENTRY_COLUMNS`
fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<ScheduleEntry> {
    let status_str: String = row.get(9)?;
    let category_str: String = row.get(10)?;
    let paused_from: Option<String> = row.get(17)?;
    let recurrence_json: Option<String> = row.get(18)?;
    let recurrence = match recurrence_json {
        Some(json) => Some(
            serde_json::from_str::<RecurrenceMeta>(&json).map_err(|e| conversion_error(18, e))?,
        ),
        None => None,
    };
    let deadline_kind: String = row.get(20)?;
    let created_at: String = row.get(24)?;
    let paused_at = parse_datetime_opt(row.get(15)?);
    let status = EntryStatus::from_stored(&status_str, paused_at);

    Ok(ScheduleEntry {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        scope_id: row.get(2)?,
        date: parse_date(row, 3)?,
        start_time: parse_time(row, 4)?,
        end_time: parse_time(row, 5)?,
        label: row.get(6)?,
        planned_hours: row.get(7)?,
        actual_hours: row.get(8)?,
        status,
        category: EntryCategory::normalize(&category_str),
        task_ref: row.get(11)?,
        parent_entry_id: row.get(12)?,
        sequence_index: row.get(13)?,
        total_group_hours: row.get(14)?,
        paused_at,
        resumed_at: parse_datetime_opt(row.get(16)?),
        paused_from: paused_from
            .as_deref()
            .filter(|_| status == EntryStatus::Paused)
            .map(EntryStatus::normalize),
        recurrence,
        deadline: parse_datetime_opt(row.get(19)?),
        deadline_kind: DeadlineKind::parse(&deadline_kind),
        deadline_reason: row.get(21)?,
        assigned_by_admin: row.get(22)?,
        completed_at: parse_datetime_opt(row.get(23)?),
        created_at: parse_datetime_fallback(&created_at),
    })
}

/// Build a RecurrenceConfig from a `recurrence_configs` row
fn row_to_config(row: &rusqlite::Row) -> rusqlite::Result<RecurrenceConfig> {
    let category_str: String = row.get(4)?;
    let weekdays_json: String = row.get(5)?;
    let weekdays: WeekdaySet =
        serde_json::from_str(&weekdays_json).map_err(|e| conversion_error(5, e))?;

    Ok(RecurrenceConfig {
        scope_id: row.get(0)?,
        start_time: parse_time(row, 1)?,
        end_time: parse_time(row, 2)?,
        label: row.get(3)?,
        category: EntryCategory::normalize(&category_str),
        weekdays,
        enabled: row.get(6)?,
    })
}

fn recurrence_json(entry: &ScheduleEntry) -> Result<Option<String>> {
    Ok(match &entry.recurrence {
        Some(meta) => Some(serde_json::to_string(meta)?),
        None => None,
    })
}

/// SQLite database for schedule entries.
///
/// Implements both [`EntryRepository`] and [`RecurrenceStore`].
pub struct EntryDb {
    conn: Connection,
}

impl EntryDb {
    /// Open the database at `<data_dir>/cadence.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("cadence.db"))
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Entries of one split group, in sequence order.
    pub fn segments(&self, parent_entry_id: &str) -> Result<Vec<ScheduleEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM schedule_entries
             WHERE parent_entry_id = ?1
             ORDER BY sequence_index ASC"
        ))?;
        let rows = stmt.query_map(params![parent_entry_id], row_to_entry)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Number of stored entries.
    pub fn count_entries(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM schedule_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl EntryRepository for EntryDb {
    fn entries_in_range(&self, query: &EntryQuery) -> Result<Vec<ScheduleEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM schedule_entries
             WHERE date >= ?1 AND date <= ?2
               AND (?3 IS NULL OR scope_id = ?3)
               AND (?4 IS NULL OR owner_id = ?4)
             ORDER BY date ASC, start_time ASC, owner_id ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                format_date(query.from),
                format_date(query.to),
                query.scope_id,
                query.owner_id,
            ],
            row_to_entry,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_entry(&self, id: &str) -> Result<Option<ScheduleEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM schedule_entries WHERE id = ?1"),
                params![id],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn create_entry(&mut self, entry: ScheduleEntry) -> Result<CreateOutcome> {
        let recurrence = recurrence_json(&entry)?;
        let inserted = self.conn.execute(
            &format!(
                "INSERT INTO schedule_entries ({ENTRY_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                         ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)
                 ON CONFLICT(owner_id, date, scope_id, label, start_time, end_time)
                 DO NOTHING"
            ),
            params![
                entry.id,
                entry.owner_id,
                entry.scope_id,
                format_date(entry.date),
                format_time_of_day(entry.start_time),
                format_time_of_day(entry.end_time),
                entry.label,
                entry.planned_hours,
                entry.actual_hours,
                entry.status.as_str(),
                entry.category.as_str(),
                entry.task_ref,
                entry.parent_entry_id,
                entry.sequence_index,
                entry.total_group_hours,
                format_datetime_opt(entry.paused_at),
                format_datetime_opt(entry.resumed_at),
                entry.paused_from.map(|s| s.as_str()),
                recurrence,
                format_datetime_opt(entry.deadline),
                entry.deadline_kind.as_str(),
                entry.deadline_reason,
                entry.assigned_by_admin,
                format_datetime_opt(entry.completed_at),
                entry.created_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            return Ok(CreateOutcome::Conflict(PersistenceConflict::of(&entry)));
        }
        Ok(CreateOutcome::Created(entry))
    }

    fn update_entry(&mut self, entry: &ScheduleEntry) -> Result<()> {
        let recurrence = recurrence_json(entry)?;
        let updated = self.conn.execute(
            "UPDATE schedule_entries
             SET owner_id = ?2, scope_id = ?3, date = ?4, start_time = ?5, end_time = ?6,
                 label = ?7, planned_hours = ?8, actual_hours = ?9, status = ?10,
                 category = ?11, task_ref = ?12, parent_entry_id = ?13,
                 sequence_index = ?14, total_group_hours = ?15, paused_at = ?16,
                 resumed_at = ?17, paused_from = ?18, recurrence = ?19, deadline = ?20,
                 deadline_kind = ?21, deadline_reason = ?22, assigned_by_admin = ?23,
                 completed_at = ?24
             WHERE id = ?1",
            params![
                entry.id,
                entry.owner_id,
                entry.scope_id,
                format_date(entry.date),
                format_time_of_day(entry.start_time),
                format_time_of_day(entry.end_time),
                entry.label,
                entry.planned_hours,
                entry.actual_hours,
                entry.status.as_str(),
                entry.category.as_str(),
                entry.task_ref,
                entry.parent_entry_id,
                entry.sequence_index,
                entry.total_group_hours,
                format_datetime_opt(entry.paused_at),
                format_datetime_opt(entry.resumed_at),
                entry.paused_from.map(|s| s.as_str()),
                recurrence,
                format_datetime_opt(entry.deadline),
                entry.deadline_kind.as_str(),
                entry.deadline_reason,
                entry.assigned_by_admin,
                format_datetime_opt(entry.completed_at),
            ],
        )?;
        if updated == 0 {
            return Err(CoreError::EntryNotFound(entry.id.clone()));
        }
        Ok(())
    }

    fn delete_entry(&mut self, id: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM entry_assignments WHERE entry_id = ?1",
            params![id],
        )?;
        let deleted = tx.execute("DELETE FROM schedule_entries WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn assign(&mut self, entry_id: &str, employee_id: &str) -> Result<()> {
        if self.get_entry(entry_id)?.is_none() {
            return Err(CoreError::EntryNotFound(entry_id.to_string()));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO entry_assignments (entry_id, employee_id, assigned_at)
             VALUES (?1, ?2, ?3)",
            params![entry_id, employee_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn assignments(&self, entry_id: &str) -> Result<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, employee_id, assigned_at FROM entry_assignments
             WHERE entry_id = ?1
             ORDER BY assigned_at ASC, employee_id ASC",
        )?;
        let rows = stmt.query_map(params![entry_id], |row| {
            let assigned_at: String = row.get(2)?;
            Ok(Assignment {
                entry_id: row.get(0)?,
                employee_id: row.get(1)?,
                assigned_at: parse_datetime_fallback(&assigned_at),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl EntryDb {
    fn load_config(&self, scope_id: &str) -> Result<Option<RecurrenceConfig>> {
        let config = self
            .conn
            .query_row(
                "SELECT scope_id, start_time, end_time, label, category, weekdays, enabled
                 FROM recurrence_configs WHERE scope_id = ?1",
                params![scope_id],
                row_to_config,
            )
            .optional()?;
        Ok(config)
    }

    fn store_config(&self, config: &RecurrenceConfig) -> Result<()> {
        let weekdays = serde_json::to_string(&config.weekdays)?;
        self.conn.execute(
            "INSERT INTO recurrence_configs
                (scope_id, start_time, end_time, label, category, weekdays, enabled, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(scope_id) DO UPDATE SET
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                label = excluded.label,
                category = excluded.category,
                weekdays = excluded.weekdays,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at",
            params![
                config.scope_id,
                format_time_of_day(config.start_time),
                format_time_of_day(config.end_time),
                config.label,
                config.category.as_str(),
                weekdays,
                config.enabled,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl RecurrenceStore for EntryDb {
    fn get_or_create(&mut self, scope_id: &str) -> Result<RecurrenceConfig> {
        if let Some(config) = self.load_config(scope_id)? {
            return Ok(config);
        }
        let config = RecurrenceConfig::disabled_default(scope_id);
        self.store_config(&config)?;
        Ok(config)
    }

    fn update(&mut self, config: RecurrenceConfig) -> Result<RecurrenceConfig> {
        config.validate()?;
        self.store_config(&config)?;
        Ok(config)
    }

    fn list(&self) -> Result<Vec<RecurrenceConfig>> {
        let mut stmt = self.conn.prepare(
            "SELECT scope_id, start_time, end_time, label, category, weekdays, enabled
             FROM recurrence_configs ORDER BY scope_id ASC",
        )?;
        let rows = stmt.query_map([], row_to_config)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{split_task, EntryAction};
    use crate::recurrence::RecurrenceRule;
    use chrono::{TimeZone, Weekday};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn make_entry(owner: &str, day: u32) -> ScheduleEntry {
        ScheduleEntry::new(owner, "proj-1", date(day), time(9, 0), time(9, 15), "Daily Standup")
            .unwrap()
    }

    #[test]
    fn create_and_get_entry() {
        let mut db = EntryDb::open_memory().unwrap();
        let mut entry = make_entry("A", 1);
        entry.task_ref = Some("task-7".into());
        entry.deadline = Some(Utc.with_ymd_and_hms(2024, 1, 5, 17, 0, 0).unwrap());
        entry.deadline_kind = DeadlineKind::Hard;
        entry.recurrence = Some(RecurrenceMeta {
            rule: RecurrenceRule::daily(),
            parent_group_id: "group-task-7".into(),
        });

        assert!(db.create_entry(entry.clone()).unwrap().is_created());
        let loaded = db.get_entry(&entry.id).unwrap().unwrap();
        assert_eq!(loaded.task_ref.as_deref(), Some("task-7"));
        assert_eq!(loaded.start_time, time(9, 0));
        assert_eq!(loaded.deadline, entry.deadline);
        assert_eq!(loaded.deadline_kind, DeadlineKind::Hard);
        assert_eq!(loaded.recurrence, entry.recurrence);
        assert_eq!(loaded.status, EntryStatus::Planned);
    }

    #[test]
    fn duplicate_occurrence_is_conflict() {
        let mut db = EntryDb::open_memory().unwrap();
        db.create_entry(make_entry("A", 1)).unwrap();
        let outcome = db.create_entry(make_entry("A", 1)).unwrap();
        assert!(matches!(outcome, CreateOutcome::Conflict(_)));
        assert!(db.create_entry(make_entry("B", 1)).unwrap().is_created());
        assert_eq!(db.count_entries().unwrap(), 2);
    }

    #[test]
    fn legacy_pause_without_timestamp_loads_as_planned() {
        let db = EntryDb::open_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO schedule_entries
                 (id, owner_id, scope_id, date, start_time, end_time, label,
                  planned_hours, status, paused_from, created_at)
                 VALUES ('legacy-1', 'A', 'proj-1', '2024-01-03', '09:00', '10:00',
                         'Imported', 1.0, 'on_hold', 'in_progress', '2023-12-01T08:00:00Z')",
                [],
            )
            .unwrap();

        let loaded = db.get_entry("legacy-1").unwrap().unwrap();
        assert_eq!(loaded.status, EntryStatus::Planned);
        assert!(loaded.paused_at.is_none());
        assert!(loaded.paused_from.is_none());
    }

    #[test]
    fn range_query_filters() {
        let mut db = EntryDb::open_memory().unwrap();
        for (owner, day) in [("A", 1), ("B", 2), ("A", 9)] {
            db.create_entry(make_entry(owner, day)).unwrap();
        }
        let week = db
            .entries_in_range(&EntryQuery::range(date(1), date(7)).scope("proj-1"))
            .unwrap();
        assert_eq!(week.len(), 2);
        let a_only = db
            .entries_in_range(&EntryQuery::range(date(1), date(31)).owner("A"))
            .unwrap();
        assert_eq!(a_only.len(), 2);
        let other_scope = db
            .entries_in_range(&EntryQuery::range(date(1), date(31)).scope("proj-2"))
            .unwrap();
        assert!(other_scope.is_empty());
    }

    #[test]
    fn update_persists_lifecycle_state() {
        let mut db = EntryDb::open_memory().unwrap();
        let mut entry = make_entry("A", 1);
        db.create_entry(entry.clone()).unwrap();

        entry.apply(EntryAction::Start).unwrap();
        entry.apply(EntryAction::Pause).unwrap();
        db.update_entry(&entry).unwrap();

        let loaded = db.get_entry(&entry.id).unwrap().unwrap();
        assert_eq!(loaded.status, EntryStatus::Paused);
        assert_eq!(loaded.paused_from, Some(EntryStatus::InProgress));
        assert!(loaded.paused_at.is_some());
        assert!(loaded.resumed_at.is_none());

        let missing = make_entry("Z", 3);
        assert!(matches!(
            db.update_entry(&missing),
            Err(CoreError::EntryNotFound(_))
        ));
    }

    #[test]
    fn delete_cascades_assignments() {
        let mut db = EntryDb::open_memory().unwrap();
        let entry = make_entry("A", 1);
        db.create_entry(entry.clone()).unwrap();
        db.assign(&entry.id, "emp-9").unwrap();
        assert_eq!(db.assignments(&entry.id).unwrap().len(), 1);

        assert!(db.delete_entry(&entry.id).unwrap());
        assert!(db.assignments(&entry.id).unwrap().is_empty());
        assert!(!db.delete_entry(&entry.id).unwrap());
        assert!(db.assign(&entry.id, "emp-9").is_err());
    }

    #[test]
    fn split_segments_survive_sibling_deletion() {
        let mut db = EntryDb::open_memory().unwrap();
        let parent = ScheduleEntry::new("A", "proj-1", date(1), time(9, 0), time(17, 0), "Migration")
            .unwrap();
        let segments = split_task(&parent, 24.0, 3).unwrap();
        for segment in &segments {
            db.create_entry(segment.clone()).unwrap();
        }
        db.delete_entry(&segments[1].id).unwrap();

        let remaining = db.segments(&parent.id).unwrap();
        let indices: Vec<_> = remaining.iter().map(|s| s.sequence_index).collect();
        assert_eq!(indices, vec![Some(1), Some(3)]);
        assert!(remaining.iter().all(|s| s.total_group_hours == Some(24.0)));
    }

    #[test]
    fn recurrence_config_lazy_default_and_update() {
        let mut db = EntryDb::open_memory().unwrap();
        let config = db.get_or_create("proj-1").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.label, "Daily Standup");

        let mut edited = config.clone();
        edited.enabled = true;
        edited.weekdays = WeekdaySet::single(Weekday::Tue);
        db.update(edited.clone()).unwrap();

        assert_eq!(db.get_or_create("proj-1").unwrap(), edited);
        assert_eq!(db.list().unwrap().len(), 1);

        let mut broken = edited;
        broken.end_time = broken.start_time;
        assert!(db.update(broken).is_err());
        assert!(db.get_or_create("proj-1").unwrap().enabled);
    }
}
