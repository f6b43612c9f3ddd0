//! Integration tests for layered configuration loading.
//!
//! Environment variables are process-global, so these tests run serially.

use pull_machine::config::PullMachineConfig;
use serial_test::serial;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create temp config");
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let config = PullMachineConfig::load_from("does/not/exist.toml").unwrap();
    assert_eq!(config, PullMachineConfig::default());
}

#[test]
#[serial]
fn test_file_values_override_defaults() {
    let file = write_config(
        r#"
        [serial]
        port = "/dev/ttyACM0"

        [sampler]
        history_window_secs = 10.0
        "#,
    );
    let config = PullMachineConfig::load_from(file.path()).unwrap();
    assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
    assert_eq!(config.sampler.history_window_secs, 10.0);
    assert_eq!(config.sampler.period_ms, 50);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config("[serial]\nbaud_rate = 9600\n");
    std::env::set_var("PULL_MACHINE_SERIAL__BAUD_RATE", "57600");
    std::env::set_var("PULL_MACHINE_CALIBRATION__ANGLE_OFFSET_DEG", "0.0");
    let result = PullMachineConfig::load_from(file.path());
    std::env::remove_var("PULL_MACHINE_SERIAL__BAUD_RATE");
    std::env::remove_var("PULL_MACHINE_CALIBRATION__ANGLE_OFFSET_DEG");

    let config = result.unwrap();
    assert_eq!(config.serial.baud_rate, 57_600);
    assert_eq!(config.calibration.angle_offset_deg, 0.0);
}

#[test]
#[serial]
fn test_invalid_values_are_rejected_after_merge() {
    let file = write_config("[sampler]\nsmoothing_window = 1\n");
    let err = PullMachineConfig::load_from(file.path()).unwrap_err();
    assert!(err.to_string().contains("smoothing_window"));
}

#[test]
#[serial]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/pull_machine.toml");
    let config = PullMachineConfig::load_from(path).unwrap();
    assert_eq!(config, PullMachineConfig::default());
}
