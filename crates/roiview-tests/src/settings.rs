//! Settings persistence tests against the real file-backed service.

use roiview_core::{Rect, RoiModel};
use roiview_effects::{EffectConfig, EffectKind};
use roiview_settings::{AppSettings, JsonSettingsService, SettingsService, CURRENT_VERSION};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    let unique = format!(
        "roiview-test-{}-{}",
        std::process::id(),
        name
    );
    std::env::temp_dir().join(unique)
}

fn sample_state() -> (RoiModel, EffectConfig) {
    let mut roi = RoiModel::default();
    roi.set_rect(Rect::new(15.0, 25.0, 120.0, 90.0));
    let mut config = EffectConfig::default();
    config.set_kind(EffectKind::ColorDetection);
    config.set_hue_lower(40.0);
    config.set_hue_upper(80.0);
    config.set_target_fps(24);
    (roi, config)
}

#[test]
fn json_service_roundtrips_modulo_saved_at() {
    let path = temp_path("roundtrip.json");
    let (roi, config) = sample_state();
    let service = JsonSettingsService;

    service.save(&AppSettings::capture(&roi, &config), &path).unwrap();
    let loaded = service.load(&path).unwrap();

    let mut roi2 = RoiModel::default();
    let mut config2 = EffectConfig::default();
    loaded.apply_to(&mut roi2, &mut config2);

    assert_eq!(roi2, roi);
    assert_eq!(config2, config);
    assert_eq!(loaded.version, CURRENT_VERSION);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn file_on_disk_uses_camel_case_keys() {
    let path = temp_path("camelcase.json");
    let (roi, config) = sample_state();
    JsonSettingsService
        .save(&AppSettings::capture(&roi, &config), &path)
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(value.get("colorDetection").is_some());
    assert!(value.get("savedAt").is_some());
    assert!(value["roi"].get("isDefined").is_some());
    assert!(value["adjustment"].get("targetFps").is_some());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn newer_schema_version_is_rejected() {
    let path = temp_path("future.json");
    let (roi, config) = sample_state();
    let mut value = serde_json::to_value(AppSettings::capture(&roi, &config)).unwrap();
    value["version"] = serde_json::json!(CURRENT_VERSION + 1);
    std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

    assert!(JsonSettingsService.load(&path).is_err());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn out_of_range_file_values_are_clamped_on_apply() {
    let path = temp_path("clamped.json");
    let (roi, config) = sample_state();
    let mut value = serde_json::to_value(AppSettings::capture(&roi, &config)).unwrap();
    value["adjustment"]["brightness"] = serde_json::json!(500.0);
    value["colorDetection"]["hueLower"] = serde_json::json!(-10.0);
    value["effect"]["blurStrength"] = serde_json::json!(2.0);
    std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

    let loaded = JsonSettingsService.load(&path).unwrap();
    let mut roi2 = RoiModel::default();
    let mut config2 = EffectConfig::default();
    loaded.apply_to(&mut roi2, &mut config2);

    assert_eq!(config2.brightness(), 100.0);
    assert_eq!(config2.hsv().hue_lower, 0.0);
    assert_eq!(config2.blur_kernel_size(), 3);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn corrupt_file_reports_settings_error() {
    let path = temp_path("corrupt.json");
    std::fs::write(&path, b"{ not json").unwrap();
    let err = JsonSettingsService.load(&path).unwrap_err();
    assert!(err.to_string().contains("settings") || err.to_string().contains("JSON"));
    let _ = std::fs::remove_file(&path);
}
