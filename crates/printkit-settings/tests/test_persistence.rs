//! Settings persistence round trips through real files

use printkit_core::{FirmwareKind, Material};
use printkit_settings::{Config, SettingsError, SettingsManager};
use std::path::PathBuf;

#[test]
fn test_save_and_reload_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let manager = SettingsManager::load(&path).unwrap();
    manager
        .update(|cfg| {
            cfg.connection.port = "/dev/ttyUSB0".to_string();
            cfg.connection.baud_rate = 250000;
            cfg.firmware.kind = FirmwareKind::Klipper;
            cfg.slicer.executable = Some(PathBuf::from("/opt/prusa/prusa-slicer"));
            cfg.slicer.profile.apply_material(Material::PETG);
        })
        .unwrap();
    manager.save().unwrap();

    let reloaded = SettingsManager::load(&path).unwrap().config();
    assert_eq!(reloaded, manager.config());
    assert_eq!(reloaded.slicer.profile.nozzle_temp, 240);
}

#[test]
fn test_toml_format_selected_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("printkit.toml");

    let mut config = Config::default();
    config.sd_card.disconnect_on_sd_print = true;
    config.save_to_file(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[sd_card]"));
    assert!(Config::load_from_file(&path).unwrap().sd_card.disconnect_on_sd_print);
}

#[test]
fn test_corrupt_file_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        SettingsManager::load(&path),
        Err(SettingsError::LoadError(_))
    ));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "polling": { "idle_interval_secs": 0 } }"#).unwrap();

    assert!(Config::load_from_file(&path).is_err());
}
