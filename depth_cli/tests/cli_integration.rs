use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, "[fusion]\nneural_hard_cap_m = 150.0\n").unwrap();
    path
}

fn write_frames(dir: &tempfile::TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("frames.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

const LIDAR_FRAME: &str = r#"{"timestamp_s": 0.0, "lidar_distance_m": 5.0, "horizontal_gps_accuracy_m": 3.0, "vertical_gps_accuracy_m": 3.0, "heading_accuracy_deg": 1.0}"#;

#[rstest]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("depth_cli").unwrap();
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains("Run")).stdout(predicate::str::contains("SelfCheck"));
}

#[rstest]
fn self_check_reports_on_missing_tile_directory() {
    let dir = tempdir().unwrap();
    let cfg_path = dir.path().join("cfg.toml");
    fs::write(&cfg_path, "[dem]\ntile_directory = \"/does/not/exist\"\n").unwrap();
    let calib_path = dir.path().join("calib.toml");

    let mut cmd = Command::cargo_bin("depth_cli").unwrap();
    cmd.arg("--config").arg(&cfg_path).arg("--calibration").arg(&calib_path).arg("self-check");
    cmd.assert().success().stdout(predicate::str::contains("missing"));
}

#[rstest]
fn health_reports_ok_for_valid_config() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let calib_path = dir.path().join("calib.toml");

    let mut cmd = Command::cargo_bin("depth_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--calibration").arg(&calib_path).arg("health");
    cmd.assert().success().stdout(predicate::str::contains("Health check: OK"));
}

#[rstest]
fn rejects_invalid_config_before_any_command_runs() {
    let dir = tempdir().unwrap();
    let cfg_path = dir.path().join("cfg.toml");
    fs::write(&cfg_path, "[fusion]\nmax_lidar_m = 0.01\nmin_lidar_m = 1.0\n").unwrap();
    let calib_path = dir.path().join("calib.toml");

    let mut cmd = Command::cargo_bin("depth_cli").unwrap();
    cmd.arg("--config").arg(&cfg_path).arg("--calibration").arg(&calib_path).arg("health");
    cmd.assert().failure();
}

#[rstest]
fn run_replays_a_frame_and_reports_lidar_distance() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let calib_path = dir.path().join("calib.toml");
    let frames = write_frames(&dir, &[LIDAR_FRAME]);

    let mut cmd = Command::cargo_bin("depth_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--calibration").arg(&calib_path).arg("run").arg("--input").arg(&frames).arg("--save-calibration-every").arg("0");
    cmd.assert().success().stdout(predicate::str::contains("dist=5.00m"));
}

#[rstest]
fn run_json_output_is_one_parseable_object_per_frame() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let calib_path = dir.path().join("calib.toml");
    let frames = write_frames(&dir, &[LIDAR_FRAME]);

    let mut cmd = Command::cargo_bin("depth_cli").unwrap();
    cmd.arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&calib_path)
        .arg("run")
        .arg("--input")
        .arg(&frames)
        .arg("--save-calibration-every")
        .arg("0");

    let out = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let line = stdout.lines().find(|l| l.starts_with('{')).expect("no JSON line in stdout");
    let v: serde_json::Value = serde_json::from_str(line).expect("valid JSON");

    assert!(v.get("distance_m").and_then(|x| x.as_f64()).is_some());
    assert!(v.get("confidence_0_1").and_then(|x| x.as_f64()).is_some());
    assert!(v.get("primary").and_then(|x| x.as_str()).is_some());
}

#[rstest]
fn run_persists_calibration_file() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let calib_path = dir.path().join("calib.toml");
    let frames = write_frames(&dir, &[LIDAR_FRAME]);

    let mut cmd = Command::cargo_bin("depth_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--calibration").arg(&calib_path).arg("run").arg("--input").arg(&frames);
    cmd.assert().success();

    assert!(calib_path.exists(), "expected calibration file to be written at {calib_path:?}");
}

#[rstest]
fn run_rejects_malformed_frame_record() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let calib_path = dir.path().join("calib.toml");
    let frames = write_frames(&dir, &["not json"]);

    let mut cmd = Command::cargo_bin("depth_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--calibration").arg(&calib_path).arg("run").arg("--input").arg(&frames);
    cmd.assert().failure().stderr(predicate::str::contains("frame record"));
}
