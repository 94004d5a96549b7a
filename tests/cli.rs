use std::fs;
use std::path::Path;

use assert_cmd::Command;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use tempfile::TempDir;

use change_audit::logging::LogLevel;
use change_audit::models::{Event, EventKind, MirrorSet, RequestEvent, UnspecifiedEvent};
use change_audit::storage::{EventSink, JsonlStore};

fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("change-audit").unwrap();
    cmd.env("CHANGE_AUDIT_DIR", dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn request(uri: &str, status: u16) -> Event {
    Event::new(EventKind::Request(RequestEvent {
        user: Some("alice".to_string()),
        method: "POST".to_string(),
        uri: uri.to_string(),
        query: None,
        status,
        application: Some("shop".to_string()),
        ip: None,
        request: None,
        response: None,
    }))
}

fn log(message: &str) -> Event {
    Event::new(EventKind::Unspecified(UnspecifiedEvent {
        message: message.to_string(),
        level: LogLevel::Warn,
        file: Some("worker.rs".to_string()),
        line: Some(12),
        application: None,
    }))
}

fn seed(dir: &Path, events: &[Event]) {
    let store = JsonlStore::new(dir.join("events.jsonl"), dir.join("mirrors.json"));
    store
        .write_batch(events, &MirrorSet::default(), None)
        .unwrap();
}

#[test]
fn test_init_writes_default_settings() {
    let dir = TempDir::new().unwrap();

    cmd(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialization complete!"));
    assert!(dir.path().join("config.json").exists());

    cmd(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already initialized."));
}

#[test]
fn test_config_show_uses_defaults() {
    let dir = TempDir::new().unwrap();

    cmd(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not present, using defaults"))
        .stdout(predicate::str::contains("events.jsonl"));
}

#[test]
fn test_config_check_valid_yaml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("candidate.yaml");
    fs::write(
        &path,
        "modules: [model]\nmodel:\n  exclude:\n    models: [\"gl:session*\", \"re:^cache_\"]\n",
    )
    .unwrap();

    cmd(&dir)
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Modules: model"))
        .stdout(predicate::str::contains("2 models"));
}

#[test]
fn test_config_check_rejects_bad_regex() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("candidate.json");
    fs::write(&path, r#"{"model": {"exclude": {"models": ["re:(unclosed"]}}}"#).unwrap();

    cmd(&dir)
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse settings"));
}

#[test]
fn test_events_list_empty() {
    let dir = TempDir::new().unwrap();

    cmd(&dir)
        .args(["events", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No events found."));
}

#[test]
fn test_events_list_filters_by_kind() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), &[request("/orders", 201), log("disk almost full")]);

    cmd(&dir)
        .args(["events", "list", "--kind", "request"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/orders"))
        .stdout(predicate::str::contains("disk almost full").not());
}

#[test]
fn test_events_show() {
    let dir = TempDir::new().unwrap();
    let event = request("/orders", 201);
    seed(dir.path(), std::slice::from_ref(&event));

    cmd(&dir)
        .args(["events", "show", &event.id.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("/orders"));

    cmd(&dir)
        .args(["events", "show", "evt-ffffffff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_events_export_csv() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), &[request("/orders", 201)]);

    cmd(&dir)
        .args(["events", "export", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ID,Created,Kind,User"))
        .stdout(predicate::str::contains("alice"));
}

#[test]
fn test_events_export_json_to_file() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), &[log("one"), log("two")]);
    let output = dir.path().join("export.json");

    cmd(&dir)
        .args(["events", "export", "--format", "json", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Exported 2 events"));

    let contents = fs::read_to_string(&output).unwrap();
    let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(value["events"].as_array().unwrap().len(), 2);
}

#[test]
fn test_events_purge() {
    let dir = TempDir::new().unwrap();
    let mut old = log("stale");
    old.created_at = Utc::now() - Duration::days(40);
    seed(dir.path(), &[old, log("fresh")]);

    cmd(&dir)
        .args(["events", "purge", "--max-age-days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 events"));

    cmd(&dir)
        .args(["events", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fresh"))
        .stdout(predicate::str::contains("stale").not());
}

#[test]
fn test_mirrors_list_empty() {
    let dir = TempDir::new().unwrap();

    cmd(&dir)
        .args(["mirrors", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No mirrors recorded."));
}

#[test]
fn test_events_purge_rejects_out_of_range_age() {
    let dir = TempDir::new().unwrap();

    cmd(&dir)
        .args(["events", "purge", "--max-age-days", "4000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--max-age-days"));

    cmd(&dir)
        .args(["events", "purge", "--max-age-days", "0"])
        .assert()
        .failure();
}
