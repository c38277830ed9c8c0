use assert_cmd::Command;
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const CELL: &str = r#"
[morphology]
spherical_root = true
[[morphology.branches]]
samples = [[0.0, 0.0, 0.0, 6.0]]
[[morphology.branches]]
parent = 0
samples = [[6.0, 0.0, 0.0, 0.5], [206.0, 0.0, 0.0, 0.5]]

[policy]
kind = "fixed_per_branch"
cv_per_branch = 3
interior_forks = true

[[paint]]
pas = { g = 0.0002, e = -70.0 }

[[stimulus]]
branch = 0
pos = 0.5
delay = 1.0
amplitude = 0.05

[run]
t_end = 5.0
dt = 0.05
"#;

fn write_cell(dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join("cell.toml");
    fs::write(&path, CELL)?;
    Ok(path)
}

#[test]
fn discretize_json_lists_every_cv() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let cell = write_cell(tmp.path())?;
    let out = tmp.path().join("cvs.json");

    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["discretize", cell.to_str().expect("temp path to UTF-8")])
        .args(["--format", "json", "--output", out.to_str().expect("temp path to UTF-8")]);
    cmd.assert().success();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out)?)?;
    let cvs = json["cvs"].as_array().expect("cvs array");
    assert!(cvs.len() >= 4, "{} CVs", cvs.len());
    assert!(cvs[0]["parent"].is_null());
    for cv in &cvs[1..] {
        assert!(cv["parent"].as_u64().is_some());
    }
    let area: f64 = cvs.iter().map(|cv| cv["area_um2"].as_f64().unwrap_or(0.0)).sum();
    let expected = 4.0 * std::f64::consts::PI * 36.0 + 2.0 * std::f64::consts::PI * 0.5 * 200.0;
    assert!((area - expected).abs() < 1e-6 * expected, "{} vs {}", area, expected);
    Ok(())
}

#[test]
fn discretize_text_to_stdout() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let cell = write_cell(tmp.path())?;

    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["discretize", cell.to_str().expect("temp path to UTF-8")]);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("  cv parent"))
        .stdout(predicate::str::contains("(0 0 "));
    Ok(())
}

#[test]
fn simulate_writes_csv_trace() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let cell = write_cell(tmp.path())?;
    let out = tmp.path().join("trace.csv");

    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["simulate", cell.to_str().expect("temp path to UTF-8")])
        .args(["--output", out.to_str().expect("temp path to UTF-8")]);
    cmd.assert().success();

    let csv = fs::read_to_string(&out)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert!(lines[0].starts_with("t,v0,v1"));
    // Header plus 101 samples from 0 to 5 ms
    assert_eq!(lines.len(), 102);

    let first: Vec<f64> = lines[1].split(',').map(|x| x.parse().unwrap()).collect();
    let last: Vec<f64> = lines[101].split(',').map(|x| x.parse().unwrap()).collect();
    assert_eq!(first[0], 0.0);
    assert!((last[0] - 5.0).abs() < 1e-9);
    assert!(first[1..].iter().all(|&v| v == -65.0));
    // The clamp depolarizes the soma above its leak reversal
    assert!(last[1] > -70.0 && last[1] != first[1]);
    Ok(())
}

#[test]
fn simulate_json_with_overrides() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let cell = write_cell(tmp.path())?;

    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["simulate", cell.to_str().expect("temp path to UTF-8")])
        .args(["--format", "json", "-T", "1", "-d", "0.25"]);
    let output = cmd.output()?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let times = json["times"].as_array().expect("times");
    assert_eq!(times.len(), 5);
    assert_eq!(json["voltages"].as_array().expect("voltages").len(), 5);
    Ok(())
}

#[test]
fn rc_reports_error_per_dt() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["rc", "--dt", "0.01,0.1", "--nsteps", "4", "--time", "2"]);
    let output = cmd.output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "dt, Iinj, t_end, R, C, Erev, v, v_exact, v_err");
    assert_eq!(lines.len(), 5);
    for line in &lines[1..] {
        let err: f64 = line.rsplit(", ").next().expect("v_err column").parse()?;
        assert!(err < 0.2, "{}", line);
    }
    Ok(())
}

#[test]
fn rc_show_prints_parameters() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["rc", "--show", "-R", "50", "-C", "0.02"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("time constant (τ) 1 ms"));
    Ok(())
}

#[test]
fn bad_inputs_fail() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;

    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["simulate", tmp.path().join("missing.toml").to_str().expect("UTF-8")]);
    cmd.assert().failure();

    let bad = tmp.path().join("bad.toml");
    // A non-spherical root needs at least two samples
    fs::write(&bad, "[[morphology.branches]]\nsamples = [[0.0, 0.0, 0.0, 1.0]]\n")?;
    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["discretize", bad.to_str().expect("UTF-8")]);
    cmd.assert().failure();

    let mut cmd = Command::cargo_bin("hines")?;
    cmd.args(["rc", "--dt", "-1"]);
    cmd.assert().failure();
    Ok(())
}
