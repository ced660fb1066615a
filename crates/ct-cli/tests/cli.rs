//! CLI command integration tests.
//! Each test uses a temp directory via CALMTUBE_DATA_DIR for isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ct_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("ct-cli").unwrap();
    cmd.env("CALMTUBE_DATA_DIR", data_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stored(dir: &TempDir) -> serde_json::Value {
    let text = std::fs::read_to_string(dir.path().join("calmtube.settings.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn classify_prints_category() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["classify", "https://www.youtube.com/watch?v=abc"])
        .assert()
        .success()
        .stdout("watch\n");
    ct_cmd(&dir)
        .args(["classify", "/"])
        .assert()
        .success()
        .stdout("home\n");
    ct_cmd(&dir)
        .args(["classify", "/feed/subscriptions"])
        .assert()
        .success()
        .stdout("feed\n");
}

#[test]
fn catalog_single_feature() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["catalog", "--feature", "hideComments"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hideComments"))
        .stdout(predicate::str::contains("Default:     off"))
        .stdout(predicate::str::contains("Pages:       watch"))
        .stdout(predicate::str::contains("ytd-comments#comments"))
        .stdout(predicate::str::contains("hideShorts").not());
}

#[test]
fn catalog_unknown_feature_fails() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["catalog", "--feature", "hideEverything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown feature 'hideEverything'"));
}

#[test]
fn settings_get_writes_defaults() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["settings", "get"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"schemaVersion\": 2"))
        .stdout(predicate::str::contains("\"enabled\": true"));
    assert_eq!(stored(&dir)["schemaVersion"], 2);
}

#[test]
fn settings_set_then_get() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["settings", "set", r#"{"enabled":false,"customMessage":"Go outside"}"#])
        .assert()
        .success();

    ct_cmd(&dir)
        .args(["settings", "get"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"enabled\": false"))
        .stdout(predicate::str::contains("Go outside"));
}

#[test]
fn settings_set_rejects_bad_patch() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["settings", "set", r#"{"enabled":"nope"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid settings patch"));
}

#[test]
fn export_import_round_trip() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let backup = source.path().join("backup.json");

    ct_cmd(&source)
        .args(["settings", "set", r#"{"reducedMotion":true}"#])
        .assert()
        .success();
    ct_cmd(&source)
        .args(["settings", "export", "--output"])
        .arg(&backup)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported settings"));

    ct_cmd(&target)
        .args(["settings", "import", "--input"])
        .arg(&backup)
        .assert()
        .success();
    assert_eq!(stored(&target)["reducedMotion"], true);
}

#[test]
fn import_rejects_invalid_backup_and_keeps_record() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["settings", "set", r#"{"enabled":false}"#])
        .assert()
        .success();

    let backup = dir.path().join("broken.json");
    std::fs::write(&backup, "[1, 2, 3]").unwrap();
    ct_cmd(&dir)
        .args(["settings", "import", "--input"])
        .arg(&backup)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Import failed"));

    assert_eq!(stored(&dir)["enabled"], false);
}

#[test]
fn reset_restores_defaults() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["settings", "set", r#"{"enabled":false}"#])
        .assert()
        .success();
    ct_cmd(&dir)
        .args(["settings", "reset"])
        .assert()
        .success();
    assert_eq!(stored(&dir)["enabled"], true);
}

#[test]
fn command_toggles_feature() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["command", "toggle-shorts"])
        .assert()
        .success()
        .stdout("toggle-shorts -> off\n");
    ct_cmd(&dir)
        .args(["command", "toggle-shorts"])
        .assert()
        .success()
        .stdout("toggle-shorts -> on\n");
    assert_eq!(stored(&dir)["features"]["hideShorts"], true);
}

#[test]
fn command_unknown_name_fails() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["command", "toggle-everything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown command"));
}

#[test]
fn simulate_home_mounts_overlay() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["simulate", "--path", "/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Page:     / (home)"))
        .stdout(predicate::str::contains("Overlay:  mounted"));
}

#[test]
fn simulate_watch_json_report() {
    let dir = TempDir::new().unwrap();
    let output = ct_cmd(&dir)
        .args(["simulate", "--path", "/watch?v=abc", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["category"], "watch");
    assert_eq!(report["overlay"], false);

    let regions = report["regions"].as_array().unwrap();
    let hidden_by = |selector: &str| {
        regions
            .iter()
            .find(|r| r["selector"] == selector)
            .map(|r| r["hiddenBy"].clone())
            .unwrap()
    };
    assert_eq!(hidden_by(".ytp-endscreen-content"), "hideEndCards");
    assert_eq!(hidden_by("#comments"), serde_json::Value::Null);
}

#[test]
fn simulate_with_settings_file() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("settings.json");
    std::fs::write(&settings, r#"{"schemaVersion":2,"enabled":false}"#).unwrap();

    ct_cmd(&dir)
        .args(["simulate", "--path", "/"])
        .arg("--settings")
        .arg(&settings)
        .assert()
        .success()
        .stdout(predicate::str::contains("Overlay:  off"))
        .stdout(predicate::str::contains("hidden (").not());
}

#[test]
fn verbose_forwards_core_log_records() {
    let dir = TempDir::new().unwrap();
    ct_cmd(&dir)
        .args(["--verbose", "settings", "reset"])
        .assert()
        .success()
        .stderr(predicate::str::contains("resetting settings to defaults"));
}
