use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, io::Write, path::PathBuf};

#[derive(Deserialize)]
struct CleanedRecord {
    activity_type: String,
    max_speed_kmh: f64,
    duration: f64,
    average_heart_rate_bpm: Option<f64>,
}

#[test]
fn clean_emits_json_lines_without_implausible_rows() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["clean", "--input", &sample_path()]);
    let output = cmd.assert().success().get_output().stdout.clone();

    let records: Vec<CleanedRecord> = String::from_utf8(output)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(records.len(), 9, "the 50 km/h run should be gone");
    for record in &records {
        if record.activity_type.contains("Running") {
            assert!(record.max_speed_kmh < 44.72);
        }
    }
    assert_eq!(records[0].duration, 2485.0);
    assert_eq!(records[0].average_heart_rate_bpm, Some(148.0));
    Ok(())
}

#[test]
fn clean_writes_a_csv_without_dropped_columns() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("cleaned.csv");

    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args([
        "clean",
        "--input",
        &sample_path(),
        "--out",
        out.to_str().expect("utf8 path"),
    ]);
    cmd.assert().success();

    let text = fs::read_to_string(&out)?;
    let header = text.lines().next().expect("header line");
    for dropped in ["Gear", "Privacy", "Activity ID", "Strokes", "Device"] {
        assert!(!header.contains(dropped), "{dropped} survived cleaning");
    }
    assert!(header.contains("Start Time"));
    assert_eq!(text.lines().count(), 10, "header plus nine retained rows");
    Ok(())
}

#[test]
fn config_file_overrides_the_speed_limits() -> Result<(), Box<dyn Error>> {
    let mut config = tempfile::NamedTempFile::new()?;
    config.write_all(b"running_speed_limit_kmh = 60.0\n")?;

    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args([
        "clean",
        "--input",
        &sample_path(),
        "--config",
        config.path().to_str().expect("utf8 path"),
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let lines = String::from_utf8(output)?.lines().count();
    assert_eq!(lines, 10, "raised limit keeps the 50 km/h run");
    Ok(())
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn sample_path() -> String {
    workspace_root()
        .join("test_data/activities_sample.csv")
        .to_string_lossy()
        .to_string()
}
