//! Integration tests for the streetmetrics binary
//!
//! These tests verify that JSON output stays a single parseable document and
//! that failures exit non-zero.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn streetmetrics_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove 'deps' directory
    path.push("streetmetrics");
    path
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(streetmetrics_bin())
        .current_dir(dir)
        .env("RUST_LOG", "error")
        .env_remove("STREETMETRICS_WORKERS")
        .env_remove("STREETMETRICS_DISPLAY_UNIT")
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn write_sources(dir: &Path) -> (String, String) {
    let districts = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"id": 1, "name": "Old Town", "area_sq_km": 1.2, "version": "2024-06"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [0.01, 0.0], [0.01, 0.01], [0.0, 0.01], [0.0, 0.0]]]
            }
        }]
    }"#;
    let roads = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"id": "w1", "class": "primary", "name": "High Street", "version": "2024-06"},
                "geometry": {"type": "LineString", "coordinates": [[0.001, 0.005], [0.009, 0.005]]}
            },
            {
                "type": "Feature",
                "properties": {"id": "w2", "class": "residential", "name": "Mill Lane", "version": "2024-06"},
                "geometry": {"type": "LineString", "coordinates": [[0.005, 0.005], [0.005, 0.009]]}
            }
        ]
    }"#;

    let districts_path = dir.join("districts.geojson");
    let roads_path = dir.join("roads.geojson");
    fs::write(&districts_path, districts).unwrap();
    fs::write(&roads_path, roads).unwrap();
    (
        districts_path.to_string_lossy().into_owned(),
        roads_path.to_string_lossy().into_owned(),
    )
}

#[test]
fn test_inspect_config_json_is_valid() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["inspect", "config", "--json", "--workers", "3"]);
    assert!(output.status.success(), "Command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");

    assert_eq!(parsed["status"], "success");
    let workers = &parsed["data"]["values"]["workers"];
    assert_eq!(workers["value"], "3");
    assert_eq!(workers["source"], "Cli");
}

#[test]
fn test_config_file_in_working_directory_is_used() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("streetmetrics.toml"), "buffer_tolerance_m = 12.5\n").unwrap();

    let output = run(dir.path(), &["inspect", "config", "--json"]);
    let parsed: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();

    let tolerance = &parsed["data"]["values"]["buffer_tolerance_m"];
    assert_eq!(tolerance["value"], "12.5");
    assert_eq!(tolerance["source"], "File");
}

#[test]
fn test_refresh_json_output() {
    let dir = TempDir::new().unwrap();
    let (districts, roads) = write_sources(dir.path());

    let output = run(
        dir.path(),
        &["refresh", "--districts", &districts, "--roads", &roads, "--json"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");

    let data = parsed.get("data").expect("Should have data field");
    assert_eq!(data["total"], 1);
    assert_eq!(data["failed"].as_array().map(Vec::len), Some(0));

    let report = &data["succeeded"][0];
    assert_eq!(report["district_id"], 1);
    assert_eq!(report["generation"], 1);
    assert_eq!(report["raw_segments"], 2);
    assert_eq!(report["source_version"], "2024-06");
}

#[test]
fn test_invalid_override_fails() {
    let dir = TempDir::new().unwrap();
    let (districts, roads) = write_sources(dir.path());

    let output = run(
        dir.path(),
        &["refresh", "--districts", &districts, "--roads", &roads, "--workers", "0"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("workers"));
}

#[test]
fn test_invalid_tile_fails() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["tiles", "3/9/0", "--json"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
