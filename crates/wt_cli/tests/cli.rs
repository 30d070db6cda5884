use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

fn write_records(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("records.json");
    let records = json!([
        {"id": "a", "occurredAt": "2024-03-01", "disposalMethod": "Recycling",
         "wasteType": "Paper", "wasteWeight": 10, "status": "verified"},
        {"id": "b", "occurredAt": "2024-03-09", "disposalMethod": "Landfilling",
         "wasteType": "General Waste", "wasteWeight": "4.5", "status": "verified"},
        {"id": "c", "occurredAt": "2024-05-01", "disposalMethod": "Burning",
         "wasteType": "Paper", "wasteWeight": 3, "status": "verified"}
    ]);
    fs::write(&path, serde_json::to_vec(&records).unwrap()).unwrap();
    path
}

fn wastestat() -> Command {
    let mut cmd = Command::cargo_bin("wastestat").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("WASTESTAT_LOG");
    cmd
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn records_mode_writes_artifacts_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let records = write_records(dir.path());
    let out = dir.path().join("out");

    wastestat()
        .arg("--records").arg(&records)
        .args(["--year", "2024", "--period-field", "occurred-at"])
        .arg("--out").arg(&out)
        .args(["--render", "json", "html"])
        .assert()
        .success();

    let agg = read_json(&out.join("aggregation.json"));
    assert!(agg["id"].as_str().unwrap().starts_with("AGG:"));
    assert_eq!(agg["result"]["category_totals"]["recycling"], json!(10.0));
    assert_eq!(agg["excluded_count"], json!(1));

    let run = read_json(&out.join("run_record.json"));
    assert_eq!(run["outputs"]["aggregation_id"], agg["id"]);
    assert!(run["id"].as_str().unwrap().starts_with("RUN:"));

    let report = read_json(&out.join("report.json"));
    assert_eq!(report["dashboard"]["total_generated_kg"], json!(14.5));
    let html = fs::read_to_string(out.join("report.html")).unwrap();
    assert!(html.contains("<th rowspan=\"2\">Month</th>"));
}

#[test]
fn manifest_mode_runs() {
    let dir = tempfile::tempdir().unwrap();
    write_records(dir.path());
    let manifest = dir.path().join("manifest.json");
    fs::write(
        &manifest,
        serde_json::to_vec(&json!({
            "records_path": "records.json",
            "year": 2024,
            "period_field": "occurred_at"
        }))
        .unwrap(),
    )
    .unwrap();
    let out = dir.path().join("out");

    wastestat()
        .arg("--manifest").arg(&manifest)
        .arg("--out").arg(&out)
        .assert()
        .success();
    assert!(out.join("aggregation.json").is_file());
    assert!(!out.join("report.json").exists());
}

#[test]
fn validate_only_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let records = write_records(dir.path());
    let out = dir.path().join("out");

    wastestat()
        .arg("--records").arg(&records)
        .args(["--year", "2024", "--period-field", "created-at", "--validate-only"])
        .arg("--out").arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("inputs OK"));
    assert!(!out.exists());
}

#[test]
fn missing_period_field_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let records = write_records(dir.path());
    wastestat()
        .arg("--records").arg(&records)
        .args(["--year", "2024"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--period-field"));
}

#[test]
fn url_inputs_are_refused() {
    wastestat()
        .args(["--records", "https://example.org/records.json", "--year", "2024",
               "--period-field", "occurred-at"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no scheme"));
}

#[test]
fn invalid_config_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let records = write_records(dir.path());
    let config = dir.path().join("config.json");
    fs::write(&config, br#"{"taxonomy": []}"#).unwrap();

    wastestat()
        .arg("--records").arg(&records)
        .arg("--config").arg(&config)
        .args(["--year", "2024", "--period-field", "occurred-at"])
        .assert()
        .code(2);
}

#[test]
fn unreadable_records_exit_4() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("records.json");
    fs::write(&records, b"{ not json").unwrap();

    wastestat()
        .arg("--records").arg(&records)
        .args(["--year", "2024", "--period-field", "occurred-at"])
        .arg("--out").arg(dir.path().join("out"))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("failed to load records"));
}
