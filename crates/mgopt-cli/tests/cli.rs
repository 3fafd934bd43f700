use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn repo_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join(relative)
}

fn demo(file: &str) -> String {
    repo_path("demos/campus")
        .join(file)
        .to_str()
        .unwrap()
        .to_string()
}

#[test]
fn mgopt_run_writes_schedule_and_summary() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("schedule.csv");
    let summary = dir.path().join("run.json");
    let mut cmd = Command::cargo_bin("mgopt").unwrap();
    cmd.args([
        "run",
        "--plant",
        &demo("plant.json"),
        "--forecast",
        &demo("forecast.csv"),
        "--config",
        &demo("config.toml"),
        "--horizons",
        "1",
        "--out",
        out.to_str().unwrap(),
        "--summary",
        summary.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("total cost"));

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("horizon,timestamp,status"), "{text}");
    let json = fs::read_to_string(&summary).unwrap();
    assert!(json.contains("\"plant\": \"demo-campus\""), "{json}");
    assert!(json.contains("\"horizons\": 1"), "{json}");
}

#[test]
fn mgopt_inspect_lists_components_and_islands() {
    let mut cmd = Command::cargo_bin("mgopt").unwrap();
    cmd.args([
        "inspect",
        "--plant",
        &demo("plant.json"),
        "--config",
        &demo("config.toml"),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("gt1"))
    .stdout(predicate::str::contains("turbine"))
    .stdout(predicate::str::contains("electric islands: 1"));
}

#[test]
fn mgopt_fit_prints_segments() {
    let mut cmd = Command::cargo_bin("mgopt").unwrap();
    cmd.args([
        "fit",
        "--plant",
        &demo("plant.json"),
        "--component",
        "gt1",
        "--config",
        &demo("config.toml"),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("LOWER"))
    .stdout(predicate::str::contains("reactive"));
}

#[test]
fn mgopt_fit_rejects_storage() {
    let mut cmd = Command::cargo_bin("mgopt").unwrap();
    cmd.args(["fit", "--plant", &demo("plant.json"), "--component", "es1"])
        .assert()
        .failure();
}

#[test]
fn mgopt_run_fails_on_missing_plant() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("schedule.csv");
    let mut cmd = Command::cargo_bin("mgopt").unwrap();
    cmd.args([
        "run",
        "--plant",
        "/nonexistent/plant.json",
        "--forecast",
        &demo("forecast.csv"),
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("/nonexistent/plant.json"));
    assert!(!out.exists());
}
