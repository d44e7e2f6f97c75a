use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use chrono::{Duration, Utc};
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

use schoolsync_core::{config, SyncConfig};
use schoolsync_sync::{JsonTimestampStore, TimestampStore};

fn schoolsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("schoolsync"));
    cmd.env("HOME", home).env("USERPROFILE", home);
    cmd
}

fn seed(home: &Path, entries: &[(&str, i64)]) {
    let store = JsonTimestampStore::open_at(home).expect("open store");
    for (key, millis) in entries {
        store.put_millis(key, *millis).expect("seed key");
    }
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run schoolsync");
    assert!(output.status.success(), "{output:?}");
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn status_on_empty_store() {
    let home = TempDir::new().expect("home");

    schoolsync_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("0 keys"))
        .stdout(contains("No refresh timestamps recorded."));
}

#[test]
fn status_json_flags_stale_keys() {
    let home = TempDir::new().expect("home");
    let now = Utc::now();
    seed(
        home.path(),
        &[
            ("grade_100_7", now.timestamp_millis()),
            ("exam_100_7_2024-03-11_2024-03-17", (now - Duration::hours(3)).timestamp_millis()),
        ],
    );

    let json = stdout_json(schoolsync_cmd(home.path()).args(["status", "--json"]));

    assert_eq!(json["summary"]["keys"], 2);
    assert_eq!(json["summary"]["stale"], 1);
    assert_eq!(json["summary"]["interval_minutes"], 60);
    let keys = json["keys"].as_array().expect("keys array");
    let exam = keys
        .iter()
        .find(|k| k["feature"] == "exam")
        .expect("exam key listed");
    assert_eq!(exam["status"], "stale");
    let grade = keys
        .iter()
        .find(|k| k["feature"] == "grade")
        .expect("grade key listed");
    assert_eq!(grade["status"], "fresh");
}

#[test]
fn status_prefix_filters_keys() {
    let home = TempDir::new().expect("home");
    let now = Utc::now().timestamp_millis();
    seed(home.path(), &[("grade_100_7", now), ("message_10_all_0", now)]);

    let json = stdout_json(schoolsync_cmd(home.path()).args(["status", "--json", "--prefix", "message"]));

    assert_eq!(json["summary"]["keys"], 1);
    assert_eq!(json["keys"][0]["key"], "message_10_all_0");
}

#[test]
fn invalidate_prefix_drops_matching_keys_only() {
    let home = TempDir::new().expect("home");
    let now = Utc::now().timestamp_millis();
    seed(
        home.path(),
        &[("grade_100_7", now), ("grade_100_8", now), ("exam_100_7", now)],
    );

    schoolsync_cmd(home.path())
        .args(["invalidate", "--prefix", "grade_"])
        .assert()
        .success()
        .stdout(contains("2 refresh timestamp(s)"));

    let store = JsonTimestampStore::open_at(home.path()).expect("reopen");
    let keys: Vec<String> = store.entries().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["exam_100_7".to_string()]);
}

#[test]
fn invalidate_all_empties_the_store() {
    let home = TempDir::new().expect("home");
    let now = Utc::now().timestamp_millis();
    seed(home.path(), &[("grade_100_7", now), ("exam_100_7", now)]);

    schoolsync_cmd(home.path())
        .args(["invalidate", "--all"])
        .assert()
        .success();

    let store = JsonTimestampStore::open_at(home.path()).expect("reopen");
    assert!(store.entries().is_empty());
}

#[test]
fn invalidate_requires_a_selector() {
    let home = TempDir::new().expect("home");

    schoolsync_cmd(home.path())
        .arg("invalidate")
        .assert()
        .failure();
}

#[test]
fn config_prints_defaults_as_json() {
    let home = TempDir::new().expect("home");

    let json = stdout_json(schoolsync_cmd(home.path()).args(["config", "--json"]));

    let parsed: SyncConfig = serde_json::from_value(json).expect("config JSON");
    assert_eq!(parsed, SyncConfig::default());
}

#[test]
fn config_setter_persists() {
    let home = TempDir::new().expect("home");

    schoolsync_cmd(home.path())
        .args(["config", "--verification-rate", "0.5", "--interval-minutes", "15"])
        .assert()
        .success()
        .stdout(contains("Saved"));

    let saved = config::load_at(home.path()).expect("load saved config");
    assert_eq!(saved.verification_rate, 0.5);
    assert_eq!(saved.services_interval_minutes, 15);
    assert!(saved.notifications_enabled);
}

#[test]
fn config_rejects_out_of_range_rate() {
    let home = TempDir::new().expect("home");

    schoolsync_cmd(home.path())
        .args(["config", "--verification-rate", "2"])
        .assert()
        .failure()
        .stderr(contains("verification_rate"));

    assert_eq!(
        config::load_at(home.path()).expect("load config"),
        SyncConfig::default()
    );
}
