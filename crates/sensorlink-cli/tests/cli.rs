//! Basic CLI tests for the sensorlink command-line interface.

use std::fs::File;

use assert_cmd::Command;
use predicates::prelude::*;
use sensorlink_core::{ChannelDescriptor, PacketCodec, ReadingValue, Readings, RecordWriter, SensorSchema};

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("sensorlink").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Self-describing sensor data"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("publish-random"))
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("dump"))
        .stdout(predicate::str::contains("demo"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("sensorlink").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sensorlink"));
}

#[test]
fn test_no_subcommand_shows_error() {
    let mut cmd = Command::cargo_bin("sensorlink").unwrap();
    cmd.assert().failure();
}

/// The demo needs no broker.
#[test]
fn test_demo_runs_offline() {
    let mut cmd = Command::cargo_bin("sensorlink").unwrap();
    cmd.arg("demo");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("CPU Temperature"))
        .stdout(predicate::str::contains("MPU6050"))
        .stdout(predicate::str::contains("chilling"));
}

#[test]
fn test_dump_record_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("sensor-0");

    let codec = PacketCodec::from_schema(
        SensorSchema::new("Room")
            .with_channel(ChannelDescriptor::scaled("humidity", 16).with_lsb(0.5))
            .with_channel(ChannelDescriptor::string("status")),
    )
    .unwrap();
    let mut writer = RecordWriter::create(File::create(&path).unwrap(), codec.blob().as_bytes()).unwrap();
    for humidity in [40.0, 41.5] {
        let readings: Readings = [
            ("humidity".to_string(), ReadingValue::Number(humidity)),
            ("status".to_string(), ReadingValue::from("ok")),
        ]
        .into();
        writer.write_packet(&codec.encode(&readings, None).unwrap()).unwrap();
    }
    writer.flush().unwrap();
    drop(writer);

    let mut cmd = Command::cargo_bin("sensorlink").unwrap();
    cmd.arg("dump").arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"name\":\"Room\""))
        .stdout(predicate::str::contains(r#"{"humidity":40.0,"status":"ok"}"#))
        .stdout(predicate::str::contains(r#"{"humidity":41.5,"status":"ok"}"#));
}

#[test]
fn test_dump_missing_file_fails() {
    let mut cmd = Command::cargo_bin("sensorlink").unwrap();
    cmd.arg("dump").arg("/nonexistent/sensorlink/record");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("opening"));
}

#[test]
fn test_missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("sensorlink").unwrap();
    cmd.arg("--config")
        .arg("/nonexistent/sensorlink.toml")
        .arg("watch");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("loading config"));
}

#[test]
fn test_wildcard_prefix_rejected() {
    let mut cmd = Command::cargo_bin("sensorlink").unwrap();
    cmd.arg("--prefix").arg("sensors/#/").arg("watch");

    cmd.assert().failure();
}
