//! Database schema migrations for cadence.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Schema version after all migrations have run.
pub const CURRENT_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!("Failed to read schema_version: {}", e);
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: entries and recurrence configs.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schedule_entries (
            id              TEXT PRIMARY KEY,
            owner_id        TEXT NOT NULL,
            scope_id        TEXT NOT NULL,
            date            TEXT NOT NULL,
            start_time      TEXT NOT NULL,
            end_time        TEXT NOT NULL,
            label           TEXT NOT NULL,
            planned_hours   REAL NOT NULL,
            actual_hours    REAL NOT NULL DEFAULT 0,
            status          TEXT NOT NULL DEFAULT 'planned',
            category        TEXT NOT NULL DEFAULT 'task',
            paused_at       TEXT,
            resumed_at      TEXT,
            paused_from     TEXT,
            completed_at    TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entries_scope_date
            ON schedule_entries(scope_id, date);
        CREATE INDEX IF NOT EXISTS idx_entries_owner_date
            ON schedule_entries(owner_id, date);

        CREATE TABLE IF NOT EXISTS recurrence_configs (
            scope_id   TEXT PRIMARY KEY,
            start_time TEXT NOT NULL,
            end_time   TEXT NOT NULL,
            label      TEXT NOT NULL,
            category   TEXT NOT NULL,
            weekdays   TEXT NOT NULL DEFAULT '[]',
            enabled    INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: task linkage, split groups, recurrence metadata and deadlines.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE schedule_entries ADD COLUMN task_ref TEXT;
         ALTER TABLE schedule_entries ADD COLUMN parent_entry_id TEXT;
         ALTER TABLE schedule_entries ADD COLUMN sequence_index INTEGER;
         ALTER TABLE schedule_entries ADD COLUMN total_group_hours REAL;
         ALTER TABLE schedule_entries ADD COLUMN recurrence TEXT;
         ALTER TABLE schedule_entries ADD COLUMN deadline TEXT;
         ALTER TABLE schedule_entries ADD COLUMN deadline_kind TEXT NOT NULL DEFAULT 'soft';
         ALTER TABLE schedule_entries ADD COLUMN deadline_reason TEXT;
         ALTER TABLE schedule_entries ADD COLUMN assigned_by_admin INTEGER NOT NULL DEFAULT 0;
         CREATE INDEX IF NOT EXISTS idx_entries_parent
            ON schedule_entries(parent_entry_id);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: additional assignees and the occurrence uniqueness constraint.
///
/// Rows that would violate the new unique index are collapsed to the
/// oldest one before the index is created.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS entry_assignments (
            entry_id    TEXT NOT NULL,
            employee_id TEXT NOT NULL,
            assigned_at TEXT NOT NULL,
            PRIMARY KEY (entry_id, employee_id)
        );

        DELETE FROM schedule_entries
        WHERE rowid NOT IN (
            SELECT MIN(rowid) FROM schedule_entries
            GROUP BY owner_id, date, scope_id, label, start_time, end_time
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_occurrence_unique
            ON schedule_entries(owner_id, date, scope_id, label, start_time, end_time);",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()
}
