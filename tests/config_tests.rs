use clap::Parser;
use clockcast::cli::Args;
use clockcast::config::{ClockSource, ConfigError, Settings};
use clockcast::sink::MeshMode;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clockcast.toml");
    fs::write(
        &path,
        r#"
tempo_bpm = 132
clock_source = "internal"

[wired]
port = "USB MIDI Interface"

[usb]
virtual_port = false

[wireless]
device_name = "stage-left"

[mesh]
mode = "peer"
low_latency = false
peers = ["10.0.0.2:5004", "10.0.0.3:5004"]

[router]
queue_depth = 8
write_timeout_us = 500

[log]
level = "debug"
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings.tempo_bpm, 132);
    assert_eq!(settings.clock_source, ClockSource::Internal);
    assert_eq!(settings.wired.port.as_deref(), Some("USB MIDI Interface"));
    assert!(!settings.usb.virtual_port);
    assert_eq!(settings.gatt_config().device_name, "stage-left");
    assert_eq!(settings.gatt_config().passkey, 123456);

    let mesh = settings.mesh_config();
    assert_eq!(mesh.mode, MeshMode::Peer);
    assert!(!mesh.low_latency);
    assert!(!mesh.encrypt);
    assert_eq!(settings.mesh_peers().unwrap().len(), 2);

    assert_eq!(settings.router.queue_depth, 8);
    assert_eq!(settings.write_timeout().as_micros(), 500);
    assert_eq!(settings.log.level, "debug");
    assert_eq!(settings.schedule().interval_us(), 60_000_000 / (132 * 24));
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let settings = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(settings.tempo_bpm, 120);
    assert_eq!(settings.mesh.mode, MeshMode::Broadcast);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "tempo_bpm = 10\n").unwrap();
    let settings = Settings::load(Some(&path)).unwrap();
    assert!(matches!(
        settings.validate(),
        Err(ConfigError::TempoOutOfRange(10))
    ));

    fs::write(&path, "[router]\nqueue_depth = 0\n").unwrap();
    let settings = Settings::load(Some(&path)).unwrap();
    assert!(matches!(
        settings.validate(),
        Err(ConfigError::ZeroQueueDepth)
    ));

    fs::write(&path, "[mesh]\npeers = [\"nowhere\"]\n").unwrap();
    let settings = Settings::load(Some(&path)).unwrap();
    assert!(matches!(
        settings.validate(),
        Err(ConfigError::InvalidPeer(_))
    ));
}

#[test]
fn test_command_line_tempo_fixes_file_tempo() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fast.toml");
    fs::write(&path, "tempo_bpm = 900\n").unwrap();

    let args = Args::parse_from(["clockcast", "--tempo", "120"]);
    let mut settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings.tempo_bpm, 900);
    args.apply(&mut settings);
    assert!(settings.validate().is_ok());
    assert_eq!(settings.tempo_bpm, 120);
}
