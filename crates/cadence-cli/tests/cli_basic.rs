//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_cadence-cli"))
        .env("CADENCE_DATA_DIR", data_dir)
        .env("CADENCE_LOG", "off")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (code, stdout, stderr) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

/// Create an entry and return its id.
fn create_entry(data_dir: &Path, date: &str, label: &str) -> String {
    let entry = run_json(
        data_dir,
        &[
            "entry", "create", "--owner", "A", "--scope", "proj-1", "--date", date, "--start",
            "09:00", "--end", "11:00", label,
        ],
    );
    entry["id"].as_str().unwrap().to_string()
}

/// Dates of the entries stored for `scope` in January 2024.
fn january_dates(data_dir: &Path, scope: &str) -> Vec<String> {
    let listed = run_json(
        data_dir,
        &["entry", "list", "--scope", scope, "--from", "2024-01-01", "--to", "2024-01-31"],
    );
    listed
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["date"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_recurrence_show_creates_disabled_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = run_json(dir.path(), &["recurrence", "show", "proj-1"]);
    assert_eq!(config["scope_id"], "proj-1");
    assert_eq!(config["enabled"], false);
}

#[test]
fn test_generate_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let set = run_json(
        dir.path(),
        &[
            "recurrence", "set", "proj-1", "--start", "11:30", "--end", "12:30", "--label",
            "Lunch sync", "--weekdays", "weekdays", "--enabled", "true",
        ],
    );
    assert_eq!(set["enabled"], true);

    let args = [
        "generate", "slots", "proj-1", "--from", "2024-01-01", "--to", "2024-01-07", "--owner",
        "A", "--owner", "B",
    ];
    let first = run_json(dir.path(), &args);
    assert_eq!(first["created"].as_array().unwrap().len(), 10);

    let second = run_json(dir.path(), &args);
    assert_eq!(second["created"].as_array().unwrap().len(), 0);
    assert_eq!(second["skipped_duplicates"], 10);

    let listed = run_json(
        dir.path(),
        &["entry", "list", "--scope", "proj-1", "--from", "2024-01-01", "--to", "2024-01-07"],
    );
    assert_eq!(listed.as_array().unwrap().len(), 10);
    assert_eq!(listed[0]["status"], "completed");
}

#[test]
fn test_generate_rule_expansion() {
    let dir = tempfile::tempdir().unwrap();
    let args = [
        "generate", "rule", "task-42", "--owner", "A", "--scope", "proj-1", "--label",
        "Backup check", "--start", "16:00", "--end", "16:30", "--kind", "weekly", "--weekdays",
        "mon,thu", "--count", "3", "--anchor", "2024-01-01", "--from", "2024-01-01", "--to",
        "2024-01-31",
    ];
    let first = run_json(dir.path(), &args);
    let dates: Vec<_> = first["created"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["date"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(dates, vec!["2024-01-01", "2024-01-04", "2024-01-08"]);

    let second = run_json(dir.path(), &args);
    assert!(second["created"].as_array().unwrap().is_empty());
}

#[test]
fn test_rule_count_holds_across_runs_with_later_windows() {
    let dir = tempfile::tempdir().unwrap();
    let rule = |from: &str| {
        run_json(
            dir.path(),
            &[
                "generate", "rule", "task-7", "--owner", "A", "--scope", "proj-2", "--label",
                "Rotate keys", "--start", "10:00", "--end", "10:15", "--count", "3", "--anchor",
                "2024-01-01", "--from", from, "--to", "2024-01-31",
            ],
        )
    };

    assert_eq!(rule("2024-01-01")["created"].as_array().unwrap().len(), 3);
    assert!(rule("2024-01-02")["created"].as_array().unwrap().is_empty());
    assert!(rule("2024-01-10")["created"].as_array().unwrap().is_empty());
    assert_eq!(
        january_dates(dir.path(), "proj-2"),
        vec!["2024-01-01", "2024-01-02", "2024-01-03"]
    );
}

#[test]
fn test_rule_requires_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(
        dir.path(),
        &[
            "generate", "rule", "task-7", "--owner", "A", "--scope", "proj-2", "--label",
            "Rotate keys", "--start", "10:00", "--end", "10:15", "--count", "3",
        ],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("--anchor"));
    assert!(january_dates(dir.path(), "proj-2").is_empty());
}

#[test]
fn test_mutating_commands_print_json() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_entry(dir.path(), "2024-03-04", "Review");

    let started = run_json(dir.path(), &["entry", "start", &id]);
    assert_eq!(started["status"], "in_progress");

    let assignments = run_json(dir.path(), &["entry", "assign", &id, "emp-9"]);
    assert_eq!(assignments[0]["employee_id"], "emp-9");

    let deleted = run_json(dir.path(), &["entry", "delete", &id]);
    assert_eq!(deleted["deleted"], id.as_str());

    let enabled = run_json(dir.path(), &["recurrence", "enable", "proj-1"]);
    assert_eq!(enabled["enabled"], true);
    let disabled = run_json(dir.path(), &["recurrence", "disable", "proj-1"]);
    assert_eq!(disabled["enabled"], false);

    let config = run_json(dir.path(), &["config", "set", "engine.batch_delay_ms", "5"]);
    assert_eq!(config["engine"]["batch_delay_ms"], 5);
}

#[test]
fn test_generate_without_owners_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["generate", "slots", "proj-1"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("team.members"));
}

#[test]
fn test_generate_rejects_reversed_window() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(
        dir.path(),
        &["generate", "slots", "proj-1", "--from", "2024-01-07", "--to", "2024-01-01", "--owner", "A"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid window"));
}

#[test]
fn test_entry_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_entry(dir.path(), "2024-03-04", "Review");

    for action in ["start", "pause", "resume", "complete"] {
        let (code, _, stderr) = run_cli(dir.path(), &["entry", action, &id]);
        assert_eq!(code, 0, "entry {action} failed: {stderr}");
    }

    let entry = run_json(dir.path(), &["entry", "hours", &id, "2.5"]);
    assert_eq!(entry["status"], "completed");
    assert_eq!(entry["actual_hours"], 2.5);

    let (code, _, stderr) = run_cli(dir.path(), &["entry", "start", &id]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid status transition"));
}

#[test]
fn test_duplicate_entry_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    create_entry(dir.path(), "2024-03-04", "Review");
    let (code, _, stderr) = run_cli(
        dir.path(),
        &[
            "entry", "create", "--owner", "A", "--scope", "proj-1", "--date", "2024-03-04",
            "--start", "09:00", "--end", "11:00", "Review",
        ],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("already exists"));
}

#[test]
fn test_split_and_segments() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_entry(dir.path(), "2024-02-05", "Data migration");

    let segments = run_json(dir.path(), &["entry", "split", &id, "--parts", "3", "--hours", "6"]);
    let segments = segments.as_array().unwrap();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[2]["sequence_index"], 3);

    let view = run_json(dir.path(), &["entry", "segments", &id]);
    assert_eq!(view["segments"].as_array().unwrap().len(), 3);
    assert_eq!(view["progress"]["total_hours"], 6.0);
}

#[test]
fn test_overdue_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let id = create_entry(dir.path(), "2024-03-11", "Report");
    run_json(dir.path(), &["entry", "hours", &id, "5"]);
    run_json(dir.path(), &["entry", "deadline", &id, "--at", "2024-03-12", "--kind", "hard"]);

    let overdue = run_json(
        dir.path(),
        &["deadline", "overdue", "--from", "2024-03-01", "--to", "2024-03-31"],
    );
    let overdue = overdue.as_array().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["id"], id.as_str());
    assert_eq!(overdue[0]["deadline_kind"], "hard");

    let report = run_json(dir.path(), &["report", "weekly", "A", "--week", "2024-03-13"]);
    assert_eq!(report["week_start"], "2024-03-11");
    assert_eq!(report["total_planned"], 2.0);
    assert_eq!(report["variance_hours"], 3.0);
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "engine.generation_horizon_days"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "30");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "team.members", "A, B"]);
    assert_eq!(code, 0);
    let config = run_json(dir.path(), &["config", "list"]);
    assert_eq!(config["team"]["members"], serde_json::json!(["A", "B"]));

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "engine.utc_offset_minutes", "99999"]);
    assert_ne!(code, 0);

    let (code, _, _) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}
